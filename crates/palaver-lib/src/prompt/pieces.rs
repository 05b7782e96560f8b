/// The raw sources a prompt is assembled from, in the order they appear in
/// the final text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptPieces {
    pub prefix: Option<String>,
    /// Text passed with `--prompt`.
    pub flag: Option<String>,
    /// Positional arguments, joined with single spaces.
    pub args: Vec<String>,
    pub file: Option<String>,
    pub stdin: Option<String>,
    pub suffix: Option<String>,
}

/// Join the non-empty pieces with `joiner`, then append `\n` when
/// `trailing_newline` is set and the result is not empty.
pub fn concatenate_prompt_pieces(
    pieces: &PromptPieces,
    joiner: &str,
    trailing_newline: bool,
) -> String {
    let args = pieces.args.join(" ");
    let ordered = [
        pieces.prefix.as_deref(),
        pieces.flag.as_deref(),
        Some(args.as_str()),
        pieces.file.as_deref(),
        pieces.stdin.as_deref(),
        pieces.suffix.as_deref(),
    ];

    let mut prompt = ordered
        .into_iter()
        .flatten()
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(joiner);

    if trailing_newline && !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt
}
