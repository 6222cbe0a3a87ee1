//! The value threaded through a pipeline.

use std::fmt;

/// An ordered sequence of strings handed from stage to stage.
///
/// Most stages treat every item independently. Input stages append items,
/// reducers such as `--last` or `--count` collapse the value to one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingValue {
    items: Vec<String>,
}

impl WorkingValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(item: impl Into<String>) -> Self {
        Self {
            items: vec![item.into()],
        }
    }

    pub fn from_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn into_items(self) -> Vec<String> {
        self.items
    }

    pub fn push(&mut self, item: impl Into<String>) {
        self.items.push(item.into());
    }

    /// Append text, one item per line.
    ///
    /// An empty string still contributes a single empty item, so `--in ""`
    /// is distinguishable from no input at all.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            self.items.push(String::new());
        } else {
            self.items.extend(text.lines().map(str::to_string));
        }
    }

    /// Apply `f` to every item.
    pub fn map_items<F>(self, f: F) -> Self
    where
        F: FnMut(String) -> String,
    {
        Self {
            items: self.items.into_iter().map(f).collect(),
        }
    }

    /// Join all items, terminating each one with `separator`.
    pub fn render(&self, separator: &str) -> String {
        let mut out = String::new();
        for item in &self.items {
            out.push_str(item);
            out.push_str(separator);
        }
        out
    }
}

impl From<Vec<String>> for WorkingValue {
    fn from(items: Vec<String>) -> Self {
        Self { items }
    }
}

impl FromIterator<String> for WorkingValue {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for WorkingValue {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Number of items a stage is willing to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemCount {
    Any,
    Exactly(usize),
}

impl ItemCount {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            ItemCount::Any => true,
            ItemCount::Exactly(n) => count == n,
        }
    }
}

impl fmt::Display for ItemCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemCount::Any => write!(f, "any number of"),
            ItemCount::Exactly(n) => write!(f, "exactly {}", n),
        }
    }
}
