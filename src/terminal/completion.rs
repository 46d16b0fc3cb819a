use rustyline::completion::{Completer, Pair};
use rustyline::{Context, Helper, Highlighter, Hinter, Validator};

/// One word of a command and the words that may follow it.
#[derive(Debug, Clone)]
struct Node {
    word: &'static str,
    children: Vec<Node>,
}

fn node(word: &'static str, children: Vec<Node>) -> Node {
    Node { word, children }
}

fn leaves(words: &[&'static str]) -> Vec<Node> {
    words.iter().map(|&word| node(word, vec![])).collect()
}

/// Tree of command words used for tab completion.
#[derive(Debug, Clone)]
pub struct CommandTree {
    roots: Vec<Node>,
}

impl CommandTree {
    pub fn general() -> Self {
        CommandTree {
            roots: vec![
                node("clear", leaves(&["buffer"])),
                node("config", leaves(&["device"])),
                node("dump", vec![]),
                node("filter", leaves(&["logname", "text", "off"])),
                node("show", leaves(&["buffer", "devices", "diagram"])),
                node(
                    "set",
                    vec![
                        node(
                            "level",
                            leaves(&["off", "err", "warn", "info", "debug", "trace"]),
                        ),
                        node("time", leaves(&["on", "off"])),
                        node("logname", leaves(&["on", "off"])),
                    ],
                ),
                node("reconnect", vec![]),
                node("switch", vec![]),
                node("help", vec![]),
                node("quit", vec![]),
            ],
        }
    }

    pub fn device() -> Self {
        CommandTree {
            roots: vec![
                node("add", leaves(&["sink", "task"])),
                node("remove", leaves(&["sink", "task", "device"])),
                node("set", leaves(&["id", "description"])),
                node("reset", vec![]),
                node("exit", vec![]),
                node("help", vec![]),
            ],
        }
    }

    /// Candidates for the word under the cursor at the end of `line`.
    ///
    /// Returns the byte offset where the word starts and the matching words.
    /// Earlier words must match tree nodes exactly (ignoring case); the word
    /// being typed matches as a case-insensitive prefix.
    pub fn complete(&self, line: &str) -> (usize, Vec<&'static str>) {
        let start = line.trim_end_matches(|c: char| !c.is_whitespace()).len();
        let prefix = line[start..].to_lowercase();

        let mut level = &self.roots;
        for word in line[..start].split_whitespace() {
            match level.iter().find(|n| n.word.eq_ignore_ascii_case(word)) {
                Some(found) => level = &found.children,
                None => return (start, Vec::new()),
            }
        }

        let candidates = level
            .iter()
            .filter(|n| n.word.starts_with(&prefix))
            .map(|n| n.word)
            .collect();
        (start, candidates)
    }
}

/// Line-editor helper wiring a [`CommandTree`] into tab completion.
#[derive(Helper, Hinter, Highlighter, Validator)]
pub struct CommandHelper {
    tree: CommandTree,
}

impl CommandHelper {
    pub fn new(tree: CommandTree) -> Self {
        CommandHelper { tree }
    }
}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, words) = self.tree.complete(&line[..pos]);
        let pairs = words
            .into_iter()
            .map(|word| Pair {
                display: word.to_string(),
                replacement: format!("{} ", word),
            })
            .collect();
        Ok((start, pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_first_words() {
        let tree = CommandTree::general();
        assert_eq!(tree.complete("s"), (0, vec!["show", "set", "switch"]));
        assert_eq!(tree.complete("Q"), (0, vec!["quit"]));
        assert_eq!(tree.complete("").1.len(), 10);
    }

    #[test]
    fn walks_the_tree_ignoring_case() {
        let tree = CommandTree::general();
        assert_eq!(tree.complete("SET level d"), (10, vec!["debug"]));
        assert_eq!(tree.complete("show "), (5, vec!["buffer", "devices", "diagram"]));
        assert_eq!(tree.complete("filter LOG"), (7, vec!["logname"]));
    }

    #[test]
    fn unknown_path_has_no_candidates() {
        let tree = CommandTree::general();
        assert!(tree.complete("frobnicate ").1.is_empty());
        assert!(tree.complete("dump ").1.is_empty());
    }

    #[test]
    fn device_tree_has_its_own_vocabulary() {
        let tree = CommandTree::device();
        assert_eq!(tree.complete("remove "), (7, vec!["sink", "task", "device"]));
        assert_eq!(tree.complete("set d"), (4, vec!["description"]));
        assert!(tree.complete("show").1.is_empty());
    }
}
