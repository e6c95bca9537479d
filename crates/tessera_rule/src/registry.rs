use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tessera_common::error::TesseraResult;

use crate::config::ShardingRuleConfig;
use crate::rule::ShardingRule;

/// One installed rule together with the version it was installed as.
#[derive(Debug)]
pub struct RuleSnapshot {
    pub version: u64,
    pub rule: Arc<ShardingRule>,
}

/// Holds the active rule snapshot of a schema.
///
/// Readers call [`current`](Self::current) without locking and keep the
/// returned `Arc` for the duration of one statement. Reloads build a new
/// rule off to the side and swap the pointer; a rule that fails to build
/// never replaces the active one.
pub struct RuleRegistry {
    current: ArcSwap<RuleSnapshot>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("version", &self.version())
            .finish()
    }
}

impl RuleRegistry {
    pub fn new(rule: ShardingRule) -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSnapshot {
                version: 1,
                rule: Arc::new(rule),
            }),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ShardingRuleConfig) -> TesseraResult<Self> {
        Ok(Self::new(config.build()?))
    }

    /// The active rule and its version, read in one load.
    pub fn current(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    pub fn snapshot(&self) -> Arc<ShardingRule> {
        Arc::clone(&self.current.load().rule)
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Build a rule from `config` and make it active. Returns the new
    /// version; on error the previous snapshot stays active.
    pub fn reload(&self, config: &ShardingRuleConfig) -> TesseraResult<u64> {
        let _guard = self.reload_lock.lock();
        match config.build() {
            Ok(rule) => Ok(self.install(rule)),
            Err(e) => {
                let version = self.version();
                tracing::warn!(error = %e, active_version = version, "rule reload rejected");
                tessera_observability::record_rule_reload("rejected", version);
                Err(e)
            }
        }
    }

    /// Swap in an already built rule.
    pub fn replace(&self, rule: ShardingRule) -> u64 {
        let _guard = self.reload_lock.lock();
        self.install(rule)
    }

    /// Callers hold `reload_lock`.
    fn install(&self, rule: ShardingRule) -> u64 {
        let version = self.version() + 1;
        self.current.store(Arc::new(RuleSnapshot {
            version,
            rule: Arc::new(rule),
        }));
        tracing::info!(version, "sharding rule snapshot installed");
        tessera_observability::record_rule_reload("installed", version);
        version
    }
}
