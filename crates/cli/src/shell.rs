use tracing::debug;

use stormcache_collection::{ExpiringMap, Timeout, Ttl};
use stormcache_common::{MAX_LISTED_ENTRIES, StormResult};

use crate::command::Command;
use crate::reply::Reply;

/// Configuração efetiva do shell.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Timeout aplicado a chaves novas quando o comando não informa um.
    pub default_timeout: Timeout,
    /// Leituras renovam o timer da chave lida.
    pub sliding: bool,
}

/// Shell em processo sobre um mapa com expiração.
pub struct Shell {
    map: ExpiringMap<String, String>,
    settings: Settings,
}

impl Shell {
    pub fn new(map: ExpiringMap<String, String>, settings: Settings) -> Self {
        Self { map, settings }
    }

    /// Abre o shell sobre um mapa novo no runtime tokio corrente.
    pub fn open(settings: Settings) -> StormResult<Self> {
        Ok(Self::new(ExpiringMap::try_new()?, settings))
    }

    /// Faz o parse de uma linha tokenizada e executa o comando.
    pub fn dispatch(&self, tokens: Vec<String>) -> StormResult<Reply> {
        let cmd = Command::from_tokens(tokens)?;
        Ok(self.execute(cmd))
    }

    fn read(&self, key: &str) -> Option<String> {
        if self.settings.sliding {
            self.map.get(key)
        } else {
            self.map.peek(key)
        }
    }

    fn render_pairs(pairs: Vec<(String, String)>) -> Reply {
        Reply::array_from(pairs.into_iter().map(|(k, v)| format!("{k} => {v}")))
    }

    /// Executa um comando e retorna a resposta.
    pub fn execute(&self, cmd: Command) -> Reply {
        debug!("comando recebido: {cmd:?}");

        match cmd {
            Command::Ping => Reply::Simple("PONG".into()),
            Command::Set {
                key,
                value,
                timeout,
            } => {
                self.map
                    .set(key, value, timeout.unwrap_or(Timeout::Refresh));
                Reply::ok()
            }
            Command::Add {
                key,
                value,
                timeout,
            } => match self
                .map
                .add(key, value, timeout.unwrap_or(self.settings.default_timeout))
            {
                Some(_) => Reply::ok(),
                None => Reply::Null,
            },
            Command::Update {
                key,
                value,
                timeout,
            } => match self
                .map
                .update(key, value, timeout.unwrap_or(Timeout::Refresh))
            {
                Some(_) => Reply::ok(),
                None => Reply::Null,
            },
            Command::Ensure {
                key,
                value,
                timeout,
            } => Reply::Bulk(self.map.ensure(
                key,
                value,
                timeout.unwrap_or(self.settings.default_timeout),
                self.settings.sliding,
            )),
            Command::Get(key) => Reply::bulk_or_null(self.read(&key)),
            Command::Peek(key) => Reply::bulk_or_null(self.map.peek(&key)),
            Command::At(index) => {
                let value = isize::try_from(index).ok().and_then(|i| {
                    if self.settings.sliding {
                        self.map.at(i)
                    } else {
                        self.map.peek_at(i)
                    }
                });
                Reply::bulk_or_null(value)
            }
            Command::Del(keys) => {
                let count = keys
                    .iter()
                    .filter(|key| self.map.delete(key.as_str()).is_some())
                    .count();
                Reply::Integer(count as i64)
            }
            // -2: chave ausente, -1: sem expiração
            Command::Ttl(key) => match self.map.ttl(&key) {
                None => Reply::Integer(-2),
                Some(Ttl::Permanent) => Reply::Integer(-1),
                Some(Ttl::Expires(left)) => {
                    Reply::Integer(i64::try_from(left.as_millis()).unwrap_or(i64::MAX))
                }
            },
            Command::Keys => Reply::array_from(
                self.map.keys().into_iter().take(MAX_LISTED_ENTRIES),
            ),
            Command::Values => Reply::array_from(
                self.map.values().into_iter().take(MAX_LISTED_ENTRIES),
            ),
            Command::Len => Reply::Integer(self.map.len() as i64),
            Command::Clear => Reply::Integer(self.map.clear() as i64),
            Command::Sort => {
                self.map.sort(false);
                Reply::ok()
            }
            Command::First(count) => {
                Self::render_pairs(self.map.first_n(count.unwrap_or(1)))
            }
            Command::Last(count) => Self::render_pairs(self.map.last_n(count.unwrap_or(1))),
            Command::Dump => Reply::Bulk(self.map.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stormcache_common::{CommandError, StoreError, StormError};

    fn shell(sliding: bool) -> Shell {
        Shell::new(
            ExpiringMap::new(),
            Settings {
                default_timeout: Timeout::permanent(),
                sliding,
            },
        )
    }

    fn run(shell: &Shell, parts: &[&str]) -> Reply {
        let tokens = parts.iter().map(|s| s.to_string()).collect();
        shell.execute(Command::from_tokens(tokens).unwrap())
    }

    #[tokio::test]
    async fn set_get_del() {
        let sh = shell(true);
        assert_eq!(run(&sh, &["SET", "foo", "bar"]), Reply::ok());
        assert_eq!(run(&sh, &["GET", "foo"]), Reply::Bulk("bar".into()));
        assert_eq!(run(&sh, &["DEL", "foo", "nope"]), Reply::Integer(1));
        assert_eq!(run(&sh, &["GET", "foo"]), Reply::Null);
    }

    #[tokio::test]
    async fn add_update_conditions() {
        let sh = shell(true);
        assert_eq!(run(&sh, &["UPDATE", "k", "v"]), Reply::Null);
        assert_eq!(run(&sh, &["ADD", "k", "v"]), Reply::ok());
        assert_eq!(run(&sh, &["ADD", "k", "w"]), Reply::Null);
        assert_eq!(run(&sh, &["UPDATE", "k", "w", "KEEP"]), Reply::ok());
        assert_eq!(run(&sh, &["ENSURE", "k", "z"]), Reply::Bulk("w".into()));
    }

    #[tokio::test]
    async fn ttl_and_expiry() {
        let sh = shell(false);
        run(&sh, &["SET", "k", "v", "50"]);
        run(&sh, &["SET", "p", "v"]);

        assert!(matches!(run(&sh, &["TTL", "k"]), Reply::Integer(ms) if ms > 0 && ms <= 50));
        assert_eq!(run(&sh, &["TTL", "p"]), Reply::Integer(-1));
        assert_eq!(run(&sh, &["TTL", "x"]), Reply::Integer(-2));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(run(&sh, &["GET", "k"]), Reply::Null);
        assert_eq!(run(&sh, &["LEN"]), Reply::Integer(1));
    }

    #[tokio::test]
    async fn default_timeout_applies_to_new_keys() {
        let sh = Shell::new(
            ExpiringMap::new(),
            Settings {
                default_timeout: Timeout::millis(40),
                sliding: false,
            },
        );
        run(&sh, &["ADD", "k", "v"]);
        run(&sh, &["SET", "p", "v"]);

        tokio::time::sleep(Duration::from_millis(90)).await;
        assert_eq!(run(&sh, &["KEYS"]), Reply::array_from(["p"]));
    }

    #[tokio::test]
    async fn listing_and_sort() {
        let sh = shell(true);
        run(&sh, &["SET", "a", "3"]);
        run(&sh, &["SET", "b", "1"]);
        run(&sh, &["SET", "c", "2"]);

        assert_eq!(run(&sh, &["AT", "-1"]), Reply::Bulk("2".into()));
        assert_eq!(run(&sh, &["SORT"]), Reply::ok());
        assert_eq!(run(&sh, &["VALUES"]), Reply::array_from(["1", "2", "3"]));
        assert_eq!(run(&sh, &["FIRST"]), Reply::array_from(["b => 1"]));
        assert_eq!(
            run(&sh, &["LAST", "5"]),
            Reply::array_from(["b => 1", "c => 2", "a => 3"])
        );
        assert_eq!(run(&sh, &["DUMP"]), Reply::Bulk("{b: 1, c: 2, a: 3}".into()));
        assert_eq!(run(&sh, &["CLEAR"]), Reply::Integer(3));
        assert_eq!(run(&sh, &["KEYS"]), Reply::Array(vec![]));
    }

    #[tokio::test]
    async fn dispatch_reports_errors() {
        let sh = Shell::open(Settings {
            default_timeout: Timeout::permanent(),
            sliding: true,
        })
        .unwrap();
        let tokens = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(matches!(
            sh.dispatch(tokens(&["NOPE"])),
            Err(StormError::Command(CommandError::Unknown(_)))
        ));
        assert!(matches!(
            sh.dispatch(tokens(&["SET", "k"])),
            Err(StormError::Command(CommandError::WrongArity(_)))
        ));
        assert_eq!(
            sh.dispatch(tokens(&["PING"])).unwrap(),
            Reply::Simple("PONG".into())
        );
    }

    #[test]
    fn open_outside_runtime() {
        let settings = Settings {
            default_timeout: Timeout::permanent(),
            sliding: true,
        };
        assert!(matches!(
            Shell::open(settings),
            Err(StormError::Store(StoreError::NoRuntime))
        ));
    }

    #[tokio::test]
    async fn ttl_saturates_on_huge_timeouts() {
        let sh = shell(false);
        sh.execute(Command::Set {
            key: "k".into(),
            value: "v".into(),
            timeout: Some(Timeout::After(Duration::from_secs(u64::MAX / 2))),
        });
        assert_eq!(run(&sh, &["TTL", "k"]), Reply::Integer(i64::MAX));
    }
}
