use rand::Rng;
use roster_core::HttpConfig;

/// Outbound client signature attached to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub accept_language: String,
}

/// Pool of client identities rotated between requests.
///
/// Rotation only lowers fingerprint correlation; it is never relied on for
/// correctness.
#[derive(Debug, Clone)]
pub struct IdentityPool {
    identities: Vec<ClientIdentity>,
    last: Option<usize>,
}

impl IdentityPool {
    /// Build a pool from every user agent / language pairing.
    ///
    /// An empty configuration falls back to a single generic identity.
    pub fn from_config(config: &HttpConfig) -> Self {
        let languages: Vec<&str> = if config.accept_languages.is_empty() {
            vec!["en-US,en;q=0.9"]
        } else {
            config.accept_languages.iter().map(String::as_str).collect()
        };

        let identities: Vec<ClientIdentity> = config
            .user_agents
            .iter()
            .flat_map(|ua| {
                languages.iter().map(move |lang| ClientIdentity {
                    user_agent: ua.clone(),
                    accept_language: (*lang).to_string(),
                })
            })
            .collect();

        Self::new(identities)
    }

    pub fn new(identities: Vec<ClientIdentity>) -> Self {
        let identities = if identities.is_empty() {
            vec![ClientIdentity {
                user_agent: concat!("roster/", env!("CARGO_PKG_VERSION")).to_string(),
                accept_language: "en-US,en;q=0.9".to_string(),
            }]
        } else {
            identities
        };
        Self {
            identities,
            last: None,
        }
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Pick the next identity, never repeating the previous one when the pool
    /// has more than one entry.
    pub fn rotate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ClientIdentity {
        let len = self.identities.len();
        let idx = match self.last {
            Some(prev) if len > 1 => {
                // Draw from the other len-1 slots.
                let offset = rng.gen_range(1..len);
                (prev + offset) % len
            }
            _ => rng.gen_range(0..len),
        };
        self.last = Some(idx);
        self.identities[idx].clone()
    }
}
