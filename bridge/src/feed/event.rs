//! Parsing of raw ZMQ feed lines.
//!
//! IRI publishes space-separated text messages whose first field names the
//! topic. Only three topics matter to the bridge:
//!
//! ```text
//! tx <hash> <address> <value> <tag> <timestamp> ...
//! rstat <toProcess> <toBroadcast> <toRequest> <toReply> <totalTransactions>
//! sn <milestoneIndex> <hash> ...
//! ```
//!
//! Everything else, and any line missing required fields, is ignored.

/// Snapshot of the node's internal transaction queues (`rstat`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub to_process: u64,
    pub to_broadcast: u64,
    pub to_request: u64,
    pub to_reply: u64,
    pub total_transactions: u64,
}

/// One classified feed line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// A transaction the node has just seen.
    NewTransaction { id: String, has_value: bool },
    /// Updated queue sizes.
    ResourceStats(ResourceStats),
    /// A transaction confirmed by a milestone.
    Confirmed { id: String },
}

impl FeedEvent {
    /// Parses one feed line, returning `None` for unknown or malformed input.
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first().copied()? {
            "tx" => {
                let id = fields.get(1)?;
                let value = fields.get(3)?;
                Some(FeedEvent::NewTransaction {
                    id: id.to_string(),
                    has_value: *value != "0",
                })
            }
            "rstat" => {
                let n = |i: usize| fields.get(i)?.parse::<u64>().ok();
                Some(FeedEvent::ResourceStats(ResourceStats {
                    to_process: n(1)?,
                    to_broadcast: n(2)?,
                    to_request: n(3)?,
                    to_reply: n(4)?,
                    total_transactions: n(5)?,
                }))
            }
            "sn" => {
                let id = fields.get(2)?;
                Some(FeedEvent::Confirmed { id: id.to_string() })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_transaction_value_flag() {
        assert_eq!(
            FeedEvent::parse("tx abc123 0 5 0 0 0 0"),
            Some(FeedEvent::NewTransaction {
                id: "abc123".into(),
                has_value: true
            })
        );
        assert_eq!(
            FeedEvent::parse("tx abc123 ADDR 0 TAG 1 0 0"),
            Some(FeedEvent::NewTransaction {
                id: "abc123".into(),
                has_value: false
            })
        );
        // Negative values are still value transactions.
        assert!(matches!(
            FeedEvent::parse("tx h a -100"),
            Some(FeedEvent::NewTransaction { has_value: true, .. })
        ));
    }

    #[test]
    fn parses_resource_stats() {
        assert_eq!(
            FeedEvent::parse("rstat 1 2 3 4 5"),
            Some(FeedEvent::ResourceStats(ResourceStats {
                to_process: 1,
                to_broadcast: 2,
                to_request: 3,
                to_reply: 4,
                total_transactions: 5,
            }))
        );
    }

    #[test]
    fn parses_confirmation_id_from_third_field() {
        assert_eq!(
            FeedEvent::parse("sn 1 abc123 ADDR TRUNK BRANCH BUNDLE"),
            Some(FeedEvent::Confirmed { id: "abc123".into() })
        );
    }

    #[test]
    fn tolerates_extra_whitespace() {
        assert_eq!(
            FeedEvent::parse("  sn\t7   xyz \n"),
            Some(FeedEvent::Confirmed { id: "xyz".into() })
        );
    }

    #[test]
    fn ignores_unknown_and_malformed_lines() {
        for line in [
            "",
            "   ",
            "lmi 1 2",
            "tx",
            "tx abc 0",
            "sn 1",
            "rstat 1 2 3 4",
            "rstat 1 2 x 4 5",
            "TX abc 0 5",
        ] {
            assert_eq!(FeedEvent::parse(line), None, "line {line:?}");
        }
    }
}
