//! Command Handler
//!
//! Turns a text command such as `XSETEX session:1 60 token` into a call on
//! [`Store`] and wraps the outcome in a [`Reply`].
//!
//! ## Commands
//!
//! ### Plain Records
//! - `GET key` - Raw value
//! - `SET key value` - Store without an envelope
//! - `DEL key [key ...]` - Delete keys, returns how many existed
//! - `EXISTS key [key ...]` - Count keys present in storage
//!
//! ### Expiring Records
//! - `XGET key` - Payload of a live record
//! - `XSET key value` - Permanent expiring record
//! - `XSETEX key seconds value` - Record that expires after `seconds`
//! - `TTL key` - Seconds left, `-1` without expiry, `-2` if absent
//! - `EXPIRE key seconds` - Reset the expiry relative to now
//! - `EXPIREAT key timestamp` - Reset the expiry to a Unix timestamp
//!
//! ### Counters
//! - `INCR key`, `INCRBY key delta`
//! - `DECR key`, `DECRBY key delta`
//!
//! ### Scans
//! - `KEYS [prefix]` - Every key under `prefix`
//! - `XKEYS [prefix]` - Live expiring keys under `prefix`
//!
//! ### Maintenance
//! - `GC [ratio]` - Reclaim space, returns the bytes freed
//! - `PING [message]`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ split_args()│───>│  execute()  │───>│ dispatch()  │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                             Store           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::reply::Reply;
use crate::config::GcConfig;
use crate::error::Error;
use crate::storage::{ReclaimOutcome, StorageEngine};
use crate::store::Store;

/// Executes text commands against a [`Store`].
pub struct CommandHandler<E: StorageEngine> {
    store: Store<E>,
    /// Ratio used by `GC` when none is given
    discard_ratio: f64,
}

impl<E: StorageEngine> Clone for CommandHandler<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            discard_ratio: self.discard_ratio,
        }
    }
}

impl<E: StorageEngine> CommandHandler<E> {
    /// Creates a handler; `GC` without arguments uses the default discard ratio.
    pub fn new(store: Store<E>) -> Self {
        Self {
            store,
            discard_ratio: GcConfig::default().discard_ratio,
        }
    }

    /// Sets the ratio `GC` uses when called without arguments.
    pub fn with_discard_ratio(mut self, discard_ratio: f64) -> Self {
        self.discard_ratio = discard_ratio;
        self
    }

    /// Returns the store commands run against.
    pub fn store(&self) -> &Store<E> {
        &self.store
    }

    /// Splits `line` into arguments and executes it.
    pub fn execute_line(&self, line: &str) -> Reply {
        match split_args(line) {
            Ok(args) => self.execute(args.as_slice()),
            Err(e) => Reply::error(e),
        }
    }

    /// Executes a command given as its name followed by its arguments.
    pub fn execute<S: AsRef<str>>(&self, args: &[S]) -> Reply {
        let Some((name, rest)) = args.split_first() else {
            return Reply::error("ERR empty command");
        };

        let rest: Vec<&str> = rest.iter().map(AsRef::as_ref).collect();
        self.dispatch(&name.as_ref().to_uppercase(), &rest)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[&str]) -> Reply {
        match cmd {
            // Plain records
            "GET" => self.cmd_get(args),
            "SET" => self.cmd_set(args),
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),

            // Expiring records
            "XGET" => self.cmd_xget(args),
            "XSET" => self.cmd_xset(args),
            "XSETEX" => self.cmd_xsetex(args),
            "TTL" => self.cmd_ttl(args),
            "EXPIRE" => self.cmd_expire(args),
            "EXPIREAT" => self.cmd_expireat(args),

            // Counters
            "INCR" => self.cmd_incr(args),
            "INCRBY" => self.cmd_incrby(args),
            "DECR" => self.cmd_decr(args),
            "DECRBY" => self.cmd_decrby(args),

            // Scans
            "KEYS" => self.cmd_keys(args),
            "XKEYS" => self.cmd_xkeys(args),

            // Maintenance
            "GC" => self.cmd_gc(args),
            "PING" => self.cmd_ping(args),

            _ => Reply::error(format!("ERR unknown command '{}'", cmd)),
        }
    }

    // ========================================================================
    // Plain Records
    // ========================================================================

    /// GET key
    fn cmd_get(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("GET");
        };

        match self.store.get(key) {
            Ok(value) => value.into(),
            Err(e) => error_reply(e),
        }
    }

    /// SET key value
    fn cmd_set(&self, args: &[&str]) -> Reply {
        let [key, value] = args else {
            return wrong_arity("SET");
        };

        match self.store.set(key, value) {
            Ok(()) => Reply::ok(),
            Err(e) => error_reply(e),
        }
    }

    /// DEL key [key ...]
    fn cmd_del(&self, args: &[&str]) -> Reply {
        if args.is_empty() {
            return wrong_arity("DEL");
        }

        let mut deleted = 0;
        for key in args {
            match self.store.delete(key) {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => return error_reply(e),
            }
        }

        Reply::integer(deleted)
    }

    /// EXISTS key [key ...]
    fn cmd_exists(&self, args: &[&str]) -> Reply {
        if args.is_empty() {
            return wrong_arity("EXISTS");
        }

        let mut count = 0;
        for key in args {
            match self.store.exists(key) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => return error_reply(e),
            }
        }

        Reply::integer(count)
    }

    // ========================================================================
    // Expiring Records
    // ========================================================================

    /// XGET key
    fn cmd_xget(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("XGET");
        };

        match self.store.xget(key) {
            Ok(value) => value.into(),
            Err(e) => error_reply(e),
        }
    }

    /// XSET key value
    fn cmd_xset(&self, args: &[&str]) -> Reply {
        let [key, value] = args else {
            return wrong_arity("XSET");
        };

        match self.store.xset(key, value) {
            Ok(()) => Reply::ok(),
            Err(e) => error_reply(e),
        }
    }

    /// XSETEX key seconds value
    fn cmd_xsetex(&self, args: &[&str]) -> Reply {
        let [key, seconds, value] = args else {
            return wrong_arity("XSETEX");
        };

        let Some(seconds) = parse_integer(seconds) else {
            return not_an_integer();
        };

        match self.store.xset_with_ttl_secs(key, value, seconds) {
            Ok(()) => Reply::ok(),
            Err(e) => error_reply(e),
        }
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("TTL");
        };

        match self.store.ttl(key) {
            Ok(remaining) => Reply::integer(remaining.as_secs()),
            Err(e) => error_reply(e),
        }
    }

    /// EXPIRE key seconds
    fn cmd_expire(&self, args: &[&str]) -> Reply {
        let [key, seconds] = args else {
            return wrong_arity("EXPIRE");
        };

        let Some(seconds) = parse_integer(seconds) else {
            return not_an_integer();
        };

        expiry_reply(self.store.expire_in_secs(key, seconds))
    }

    /// EXPIREAT key timestamp
    fn cmd_expireat(&self, args: &[&str]) -> Reply {
        let [key, timestamp] = args else {
            return wrong_arity("EXPIREAT");
        };

        let Some(timestamp) = parse_integer(timestamp) else {
            return not_an_integer();
        };

        let Some(instant) = unix_timestamp(timestamp) else {
            return Reply::error("ERR invalid expire time in 'EXPIREAT' command");
        };

        expiry_reply(self.store.expire_at(key, instant))
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// INCR key
    fn cmd_incr(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("INCR");
        };

        counter_reply(self.store.increment(key))
    }

    /// INCRBY key increment
    fn cmd_incrby(&self, args: &[&str]) -> Reply {
        let [key, delta] = args else {
            return wrong_arity("INCRBY");
        };

        let Some(delta) = parse_integer(delta) else {
            return not_an_integer();
        };

        counter_reply(self.store.increment_by(key, delta))
    }

    /// DECR key
    fn cmd_decr(&self, args: &[&str]) -> Reply {
        let [key] = args else {
            return wrong_arity("DECR");
        };

        counter_reply(self.store.decrement(key))
    }

    /// DECRBY key decrement
    fn cmd_decrby(&self, args: &[&str]) -> Reply {
        let [key, delta] = args else {
            return wrong_arity("DECRBY");
        };

        let Some(delta) = parse_integer(delta) else {
            return not_an_integer();
        };

        counter_reply(self.store.decrement_by(key, delta))
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// KEYS [prefix]
    fn cmd_keys(&self, args: &[&str]) -> Reply {
        let prefix = match args {
            [] => "",
            [prefix] => *prefix,
            _ => return wrong_arity("KEYS"),
        };

        keys_reply(self.store.find_keys(prefix))
    }

    /// XKEYS [prefix]
    fn cmd_xkeys(&self, args: &[&str]) -> Reply {
        let prefix = match args {
            [] => "",
            [prefix] => *prefix,
            _ => return wrong_arity("XKEYS"),
        };

        keys_reply(self.store.find_live_expiring_keys(prefix))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// GC [ratio]
    fn cmd_gc(&self, args: &[&str]) -> Reply {
        let ratio = match args {
            [] => self.discard_ratio,
            [ratio] => match ratio.parse::<f64>() {
                Ok(r) => r,
                Err(_) => return Reply::error("ERR value is not a valid float"),
            },
            _ => return wrong_arity("GC"),
        };

        match self.store.reclaim(ratio) {
            Ok(ReclaimOutcome::Reclaimed { bytes }) => {
                Reply::integer(i64::try_from(bytes).unwrap_or(i64::MAX))
            }
            Ok(ReclaimOutcome::NothingToReclaim) => Reply::integer(0),
            Err(e) => error_reply(e),
        }
    }

    /// PING [message]
    fn cmd_ping(&self, args: &[&str]) -> Reply {
        match args {
            [] => Reply::status("PONG"),
            [message] => Reply::bulk(Bytes::copy_from_slice(message.as_bytes())),
            _ => wrong_arity("PING"),
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Splits a command line into arguments.
///
/// Arguments are separated by whitespace. Double quotes group an argument
/// containing spaces; inside them `\"`, `\\`, `\n` and `\t` are unescaped.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(args);
        }

        let mut arg = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => arg.push('\n'),
                        Some('t') => arg.push('\t'),
                        Some(c) => arg.push(c),
                        None => return Err("ERR unbalanced quotes in request".to_string()),
                    },
                    Some(c) => arg.push(c),
                    None => return Err("ERR unbalanced quotes in request".to_string()),
                }
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err("ERR closing quote must be followed by a space".to_string());
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                arg.push(c);
            }
        }

        args.push(arg);
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse().ok()
}

fn unix_timestamp(secs: i64) -> Option<SystemTime> {
    let offset = Duration::from_secs(secs.unsigned_abs());
    if secs >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    }
}

fn wrong_arity(cmd: &str) -> Reply {
    Reply::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd
    ))
}

fn not_an_integer() -> Reply {
    Reply::error("ERR value is not an integer or out of range")
}

fn error_reply(e: Error) -> Reply {
    Reply::error(format!("ERR {}", e))
}

/// `1` if the expiry was updated, `0` if there was nothing to update.
fn expiry_reply(result: crate::error::Result<()>) -> Reply {
    match result {
        Ok(()) => Reply::integer(1),
        Err(e) if e.is_not_found() => Reply::integer(0),
        Err(e) => error_reply(e),
    }
}

fn counter_reply(result: crate::error::Result<i64>) -> Reply {
    match result {
        Ok(n) => Reply::integer(n),
        Err(Error::Parse { .. }) => not_an_integer(),
        Err(Error::Overflow { .. }) => {
            Reply::error("ERR increment or decrement would overflow")
        }
        Err(e) => error_reply(e),
    }
}

fn keys_reply(result: crate::error::Result<Vec<String>>) -> Reply {
    match result {
        Ok(keys) => Reply::array(keys.into_iter().map(Reply::bulk).collect()),
        Err(e) => error_reply(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Remaining;
    use std::thread;

    fn create_handler() -> CommandHandler<crate::storage::SledEngine> {
        CommandHandler::new(Store::temporary().unwrap())
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();

        assert_eq!(handler.execute_line("PING"), Reply::status("PONG"));
        assert_eq!(handler.execute_line("ping hello"), Reply::bulk("hello"));
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(handler.execute_line("SET key value"), Reply::ok());
        assert_eq!(handler.execute_line("GET key"), Reply::bulk("value"));
        assert_eq!(handler.execute_line("GET nonexistent"), Reply::Nil);
    }

    #[test]
    fn test_del_and_exists() {
        let handler = create_handler();

        handler.execute_line("SET key1 value1");
        handler.execute_line("XSET key2 value2");

        assert_eq!(
            handler.execute_line("EXISTS key1 key2 key3"),
            Reply::integer(2)
        );
        assert_eq!(
            handler.execute_line("DEL key1 key2 key3"),
            Reply::integer(2)
        );
        assert_eq!(handler.execute_line("EXISTS key1"), Reply::integer(0));
    }

    #[test]
    fn test_concurrent_del_counts_each_key_once() {
        let handler = create_handler();
        let keys: Vec<String> = (0..200).map(|i| format!("key:{}", i)).collect();
        for key in &keys {
            handler.store().set(key, "v").unwrap();
        }

        let command = format!("DEL {}", keys.join(" "));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let handler = handler.clone();
                let command = command.clone();
                thread::spawn(move || match handler.execute_line(&command) {
                    Reply::Integer(n) => n,
                    other => panic!("unexpected reply {:?}", other),
                })
            })
            .collect();

        let total: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_xset_xget_ttl() {
        let handler = create_handler();

        assert_eq!(handler.execute_line("XSET forever v"), Reply::ok());
        assert_eq!(handler.execute_line("XGET forever"), Reply::bulk("v"));
        assert_eq!(handler.execute_line("TTL forever"), Reply::integer(-1));

        assert_eq!(handler.execute_line("XSETEX temp 100 v"), Reply::ok());
        match handler.execute_line("TTL temp") {
            Reply::Integer(n) => assert!(n > 98 && n <= 100),
            other => panic!("unexpected reply {:?}", other),
        }

        assert_eq!(handler.execute_line("TTL missing"), Reply::integer(-2));
        assert_eq!(handler.execute_line("XGET missing"), Reply::Nil);
    }

    #[test]
    fn test_xsetex_in_the_past() {
        let handler = create_handler();

        assert_eq!(handler.execute_line("XSETEX gone -10 v"), Reply::ok());
        assert_eq!(handler.execute_line("XGET gone"), Reply::Nil);
        assert_eq!(handler.execute_line("EXISTS gone"), Reply::integer(0));
    }

    #[test]
    fn test_expire() {
        let handler = create_handler();

        handler.execute_line("XSET key value");
        assert_eq!(handler.execute_line("EXPIRE key 1"), Reply::integer(1));
        assert_eq!(handler.execute_line("EXPIRE missing 10"), Reply::integer(0));

        thread::sleep(Duration::from_millis(2100));
        assert_eq!(handler.execute_line("XGET key"), Reply::Nil);
    }

    #[test]
    fn test_expireat() {
        let handler = create_handler();
        handler.execute_line("XSET key value");

        let future = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 500;
        assert_eq!(
            handler.execute_line(&format!("EXPIREAT key {}", future)),
            Reply::integer(1)
        );
        assert!(matches!(
            handler.store().ttl("key").unwrap(),
            Remaining::Seconds(n) if n > 490
        ));

        assert_eq!(handler.execute_line("EXPIREAT key 1"), Reply::integer(1));
        assert_eq!(handler.execute_line("XGET key"), Reply::Nil);
    }

    #[test]
    fn test_incr_decr() {
        let handler = create_handler();

        assert_eq!(handler.execute_line("INCR counter"), Reply::integer(1));
        assert_eq!(handler.execute_line("INCR counter"), Reply::integer(2));
        assert_eq!(handler.execute_line("DECR counter"), Reply::integer(1));
        assert_eq!(
            handler.execute_line("INCRBY counter 10"),
            Reply::integer(11)
        );
        assert_eq!(
            handler.execute_line("DECRBY counter 5"),
            Reply::integer(6)
        );
        assert!(handler.execute_line("INCRBY counter ten").is_error());
    }

    #[test]
    fn test_counter_errors() {
        let handler = create_handler();

        handler.execute_line("XSET text hello");
        assert_eq!(
            handler.execute_line("INCR text"),
            Reply::error("ERR value is not an integer or out of range")
        );

        handler.execute_line(&format!("XSET max {}", i64::MAX));
        assert_eq!(
            handler.execute_line("INCR max"),
            Reply::error("ERR increment or decrement would overflow")
        );

        // Plain value under an expiring command
        handler.execute_line("SET plain 1");
        assert!(handler.execute_line("INCR plain").is_error());
    }

    #[test]
    fn test_keys_and_xkeys() {
        let handler = create_handler();

        handler.execute_line("SET user:1 a");
        handler.execute_line("XSET user:2 b");
        handler.execute_line("XSETEX user:3 -5 c");
        handler.execute_line("SET order:1 d");

        assert_eq!(
            handler.execute_line("KEYS user:"),
            Reply::array(vec![
                Reply::bulk("user:1"),
                Reply::bulk("user:2"),
                Reply::bulk("user:3"),
            ])
        );
        assert_eq!(
            handler.execute_line("XKEYS user:"),
            Reply::array(vec![Reply::bulk("user:2")])
        );
        match handler.execute_line("KEYS") {
            Reply::Array(keys) => assert_eq!(keys.len(), 4),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_gc() {
        let handler = create_handler();

        assert!(matches!(handler.execute_line("GC"), Reply::Integer(_)));
        assert!(matches!(handler.execute_line("GC 0.25"), Reply::Integer(_)));
        assert!(handler.execute_line("GC 1.0").is_error());
        assert!(handler.execute_line("GC lots").is_error());
    }

    #[test]
    fn test_wrong_arity_and_unknown() {
        let handler = create_handler();

        assert_eq!(
            handler.execute_line("GET"),
            Reply::error("ERR wrong number of arguments for 'GET' command")
        );
        assert_eq!(
            handler.execute_line("FOOBAR"),
            Reply::error("ERR unknown command 'FOOBAR'")
        );
        assert_eq!(handler.execute_line("   "), Reply::error("ERR empty command"));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("GET key").unwrap(), vec!["GET", "key"]);
        assert_eq!(
            split_args("  SET  greeting \"hello world\" ").unwrap(),
            vec!["SET", "greeting", "hello world"]
        );
        assert_eq!(
            split_args(r#"SET q "say \"hi\"\n""#).unwrap(),
            vec!["SET", "q", "say \"hi\"\n"]
        );
        assert_eq!(split_args("SET e \"\"").unwrap(), vec!["SET", "e", ""]);
        assert!(split_args("").unwrap().is_empty());
        assert!(split_args("SET k \"open").is_err());
        assert!(split_args("SET k \"a\"b").is_err());
    }

    #[test]
    fn test_quoted_values_round_trip() {
        let handler = create_handler();

        handler.execute_line("XSET msg \"hello world\"");
        assert_eq!(handler.execute_line("XGET msg"), Reply::bulk("hello world"));
    }
}
