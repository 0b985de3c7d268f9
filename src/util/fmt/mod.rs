use crate::token::Span;

pub mod error;
pub mod tree;

/// The source a diagnostic points into. Without it, positions are rendered as
/// raw byte ranges.
#[derive(Copy, Clone, Debug)]
pub struct Context<'src> {
    pub src: Option<&'src str>,
}

impl<'src> Context<'src> {
    pub fn new(src: &'src str) -> Self {
        Context { src: Some(src) }
    }

    pub fn without_source() -> Self {
        Context { src: None }
    }

    /// Renders `span` as `line:col` if the source is known.
    pub fn location(&self, span: Span) -> impl std::fmt::Display + 'src {
        Location(span, self.src)
    }
}

/// Analogous to [`std::fmt::Display`], but also contains the program context,
/// such as the source text positions refer to.
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display<'a>(&'a self, ctx: &'a Context<'_>) -> impl std::fmt::Display + 'a
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'a, T: Show>(pub &'a T, pub &'a Context<'a>);

impl<T> std::fmt::Display for Display<'_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}

struct Location<'src>(Span, Option<&'src str>);

impl std::fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location(span, Some(src)) => {
                let (line, col) = span.line_col(src);
                write!(f, "{line}:{col}")
            }
            Location(span, None) => write!(f, "{span}"),
        }
    }
}
