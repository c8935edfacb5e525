/// One source line split into an optional label and its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub number: usize,
    pub label: Option<&'a str>,
    pub tokens: Vec<&'a str>,
}

impl<'a> Line<'a> {
    pub fn mnemonic(&self) -> Option<&'a str> {
        self.tokens.first().copied()
    }

    pub fn operands(&self) -> &[&'a str] {
        self.tokens.get(1..).unwrap_or(&[])
    }
}

/// Everything before the first `#`.
pub fn strip_comment(text: &str) -> &str {
    text.split_once('#').map_or(text, |(code, _)| code)
}

pub fn tokenize(number: usize, text: &str) -> Line<'_> {
    let mut tokens: Vec<&str> = strip_comment(text)
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();
    let mut label = None;
    if let Some((name, rest)) = tokens.first().copied().and_then(|t| t.split_once(':')) {
        if !name.is_empty() {
            label = Some(name);
        }
        if rest.is_empty() {
            tokens.remove(0);
        } else {
            tokens[0] = rest;
        }
    }
    Line {
        number,
        label,
        tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_commas_and_whitespace() {
        let l = tokenize(3, "\tadd $t2,$t0, $t1   # sum");
        assert_eq!(l.number, 3);
        assert_eq!(l.label, None);
        assert_eq!(l.tokens, vec!["add", "$t2", "$t0", "$t1"]);
        assert_eq!(l.operands(), &["$t2", "$t0", "$t1"]);
    }

    #[test]
    fn extracts_labels() {
        let l = tokenize(1, "LOOP: beq $zero, $zero, LOOP");
        assert_eq!(l.label, Some("LOOP"));
        assert_eq!(l.mnemonic(), Some("beq"));

        let glued = tokenize(1, "END:syscall");
        assert_eq!(glued.label, Some("END"));
        assert_eq!(glued.tokens, vec!["syscall"]);

        let bare = tokenize(1, "DATA:");
        assert_eq!(bare.label, Some("DATA"));
        assert!(bare.tokens.is_empty());
    }

    #[test]
    fn comment_only_and_blank_lines_are_empty() {
        assert!(tokenize(1, "   # nothing here").tokens.is_empty());
        assert!(tokenize(1, "").tokens.is_empty());
        assert_eq!(tokenize(1, "syscall#exit").tokens, vec!["syscall"]);
    }
}
