use stormcache_collection::Timeout;
use stormcache_common::CommandError;

use crate::parse::Parse;

/// Enum com todos os comandos do shell.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Set {
        key: String,
        value: String,
        timeout: Option<Timeout>,
    },
    Add {
        key: String,
        value: String,
        timeout: Option<Timeout>,
    },
    Update {
        key: String,
        value: String,
        timeout: Option<Timeout>,
    },
    Ensure {
        key: String,
        value: String,
        timeout: Option<Timeout>,
    },
    Get(String),
    Peek(String),
    At(i64),
    Del(Vec<String>),
    Ttl(String),
    Keys,
    Values,
    Len,
    Clear,
    Sort,
    First(Option<usize>),
    Last(Option<usize>),
    Dump,
}

impl Command {
    /// Faz o parse de uma linha já tokenizada em um Command.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Command, CommandError> {
        let mut parse = Parse::new(tokens)?;
        let cmd_name = parse.next_string()?.to_uppercase();

        let cmd = match cmd_name.as_str() {
            "PING" => {
                parse.finish()?;
                Command::Ping
            }
            "SET" | "ADD" | "UPDATE" | "ENSURE" => {
                if parse.remaining() < 2 {
                    return Err(CommandError::WrongArity(cmd_name));
                }
                let key = parse.next_string()?;
                let value = parse.next_string()?;
                let timeout = parse.next_timeout()?;
                parse.finish()?;
                match cmd_name.as_str() {
                    "SET" => Command::Set { key, value, timeout },
                    "ADD" => Command::Add { key, value, timeout },
                    "UPDATE" => Command::Update { key, value, timeout },
                    _ => Command::Ensure { key, value, timeout },
                }
            }
            "GET" | "PEEK" | "TTL" => {
                let key = parse.next_string()?;
                parse.finish()?;
                match cmd_name.as_str() {
                    "GET" => Command::Get(key),
                    "PEEK" => Command::Peek(key),
                    _ => Command::Ttl(key),
                }
            }
            "AT" => {
                let index = parse.next_int()?;
                parse.finish()?;
                Command::At(index)
            }
            "DEL" => {
                if !parse.has_remaining() {
                    return Err(CommandError::WrongArity("DEL".into()));
                }
                let mut keys = Vec::new();
                while parse.has_remaining() {
                    keys.push(parse.next_string()?);
                }
                Command::Del(keys)
            }
            "FIRST" | "LAST" => {
                let count = if parse.has_remaining() {
                    let n = parse.next_int()?;
                    Some(usize::try_from(n).map_err(|_| {
                        CommandError::InvalidArgument(format!("contagem negativa: {n}"))
                    })?)
                } else {
                    None
                };
                parse.finish()?;
                if cmd_name == "FIRST" {
                    Command::First(count)
                } else {
                    Command::Last(count)
                }
            }
            "KEYS" | "VALUES" | "LEN" | "CLEAR" | "SORT" | "DUMP" => {
                parse.finish()?;
                match cmd_name.as_str() {
                    "KEYS" => Command::Keys,
                    "VALUES" => Command::Values,
                    "LEN" => Command::Len,
                    "CLEAR" => Command::Clear,
                    "SORT" => Command::Sort,
                    _ => Command::Dump,
                }
            }
            _ => return Err(CommandError::Unknown(cmd_name)),
        };

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_ping() {
        let cmd = Command::from_tokens(tokens(&["PING"])).unwrap();
        assert_eq!(cmd, Command::Ping);
    }

    #[test]
    fn parse_set_without_timeout() {
        let cmd = Command::from_tokens(tokens(&["SET", "key", "value"])).unwrap();
        assert_eq!(
            cmd,
            Command::Set {
                key: "key".into(),
                value: "value".into(),
                timeout: None,
            }
        );
    }

    #[test]
    fn parse_set_with_timeout() {
        let cmd = Command::from_tokens(tokens(&["set", "key", "value", "250"])).unwrap();
        match cmd {
            Command::Set { timeout, .. } => {
                assert_eq!(timeout, Some(Timeout::After(Duration::from_millis(250))));
            }
            _ => panic!("expected Set"),
        }
    }

    #[test]
    fn parse_update_keep() {
        let cmd = Command::from_tokens(tokens(&["UPDATE", "key", "value", "KEEP"])).unwrap();
        match cmd {
            Command::Update { timeout, .. } => assert_eq!(timeout, Some(Timeout::Keep)),
            _ => panic!("expected Update"),
        }
    }

    #[test]
    fn parse_add_and_ensure() {
        assert!(matches!(
            Command::from_tokens(tokens(&["ADD", "k", "v"])).unwrap(),
            Command::Add { .. }
        ));
        assert!(matches!(
            Command::from_tokens(tokens(&["ENSURE", "k", "v", "100"])).unwrap(),
            Command::Ensure { .. }
        ));
    }

    #[test]
    fn parse_reads() {
        assert_eq!(
            Command::from_tokens(tokens(&["GET", "k"])).unwrap(),
            Command::Get("k".into())
        );
        assert_eq!(
            Command::from_tokens(tokens(&["peek", "k"])).unwrap(),
            Command::Peek("k".into())
        );
        assert_eq!(
            Command::from_tokens(tokens(&["AT", "-1"])).unwrap(),
            Command::At(-1)
        );
        assert_eq!(
            Command::from_tokens(tokens(&["TTL", "k"])).unwrap(),
            Command::Ttl("k".into())
        );
    }

    #[test]
    fn parse_del_multiple() {
        let cmd = Command::from_tokens(tokens(&["DEL", "a", "b"])).unwrap();
        assert_eq!(cmd, Command::Del(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn parse_first_last() {
        assert_eq!(
            Command::from_tokens(tokens(&["FIRST"])).unwrap(),
            Command::First(None)
        );
        assert_eq!(
            Command::from_tokens(tokens(&["LAST", "3"])).unwrap(),
            Command::Last(Some(3))
        );
        assert!(Command::from_tokens(tokens(&["LAST", "-3"])).is_err());
    }

    #[test]
    fn parse_unknown_command() {
        assert!(matches!(
            Command::from_tokens(tokens(&["flushall"])),
            Err(CommandError::Unknown(name)) if name == "FLUSHALL"
        ));
    }

    #[test]
    fn wrong_arity() {
        assert!(matches!(
            Command::from_tokens(tokens(&["DEL"])),
            Err(CommandError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_tokens(tokens(&["SET"])),
            Err(CommandError::WrongArity(_))
        ));
        assert!(matches!(
            Command::from_tokens(tokens(&["SET", "k"])),
            Err(CommandError::WrongArity(name)) if name == "SET"
        ));
        assert!(matches!(
            Command::from_tokens(tokens(&["ENSURE", "k"])),
            Err(CommandError::WrongArity(_))
        ));
        assert!(Command::from_tokens(tokens(&["GET"])).is_err());
    }

    #[test]
    fn invalid_timeout() {
        assert!(matches!(
            Command::from_tokens(tokens(&["SET", "k", "v", "soon"])),
            Err(CommandError::InvalidTimeout(_))
        ));
    }
}
