/// Failure messages that point at defective scene code rather than at
/// the infrastructure.
pub const RETRIABLE_MARKERS: [&str; 3] = [
    "Manim generation failed",
    "Failed to generate",
    "Manim service failed",
];

/// Whether a failed attempt is worth another try.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// The generated content was at fault, regenerating may fix it.
    Retriable,
    /// Regenerating cannot help.
    Fatal,
}

/// Classifies a rendering failure.
///
/// A typed flag from the service wins. Without one, the message is
/// matched against [`RETRIABLE_MARKERS`].
pub fn classify(message: &str, retriable: Option<bool>) -> Disposition {
    let retriable = retriable.unwrap_or_else(|| {
        RETRIABLE_MARKERS.iter().any(|marker| message.contains(marker))
    });
    if retriable {
        Disposition::Retriable
    } else {
        Disposition::Fatal
    }
}
