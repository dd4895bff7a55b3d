//! Datastore identifiers.
//!
//! Mirrors the C source's `ncds2str` table (`session_client.c`): a small
//! closed enum mapped to the wire tokens `running`/`startup`/`candidate`,
//! plus the two ephemeral, RPC-scoped alternatives `config`/`url` that only
//! some containing RPCs permit (spec §4.3).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datastore {
    Config,
    Url,
    Running,
    Startup,
    Candidate,
}

impl Datastore {
    pub fn as_token(self) -> &'static str {
        match self {
            Datastore::Config => "config",
            Datastore::Url => "url",
            Datastore::Running => "running",
            Datastore::Startup => "startup",
            Datastore::Candidate => "candidate",
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for Datastore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(Datastore::Config),
            "url" => Ok(Datastore::Url),
            "running" => Ok(Datastore::Running),
            "startup" => Ok(Datastore::Startup),
            "candidate" => Ok(Datastore::Candidate),
            other => Err(format!("unknown datastore \"{other}\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_token() {
        for ds in [
            Datastore::Config,
            Datastore::Url,
            Datastore::Running,
            Datastore::Startup,
            Datastore::Candidate,
        ] {
            assert_eq!(Datastore::from_str(ds.as_token()).unwrap(), ds);
        }
    }
}
