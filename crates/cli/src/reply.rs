use std::fmt;

/// Resposta de um comando do shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(String),
    Null,
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".into())
    }

    pub fn bulk_or_null(value: Option<String>) -> Self {
        value.map(Reply::Bulk).unwrap_or(Reply::Null)
    }

    pub fn array_from<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Array(items.into_iter().map(|s| Reply::Bulk(s.into())).collect())
    }

    /// Formata a resposta para exibição humana.
    fn render(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match self {
            Reply::Simple(s) => format!("{pad}{s}"),
            Reply::Error(s) => format!("{pad}(error) {s}"),
            Reply::Integer(n) => format!("{pad}(integer) {n}"),
            Reply::Bulk(s) => format!("{pad}\"{s}\""),
            Reply::Null => format!("{pad}(nil)"),
            Reply::Array(items) => {
                if items.is_empty() {
                    return format!("{pad}(empty array)");
                }
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{pad}{}) {}", i + 1, item.render(0)))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(0))
    }
}
