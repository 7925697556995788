//! StratLab Core: market data access, domain types, indicators, strategies and
//! the single-symbol simulation engine.
//!
//! Everything here is deterministic and free of global state. Parallel
//! optimization, metrics and result storage live in `stratlab-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod strategy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across optimizer workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::ParameterSet>();
        require_sync::<domain::ParameterSet>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();

        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::SimulationOutput>();
        require_sync::<engine::SimulationOutput>();
        require_send::<engine::SimulationError>();
        require_sync::<engine::SimulationError>();

        require_send::<fingerprint::Fingerprint>();
        require_sync::<fingerprint::Fingerprint>();
        require_send::<fingerprint::DatasetHash>();
        require_sync::<fingerprint::DatasetHash>();

        require_send::<data::BarLoader>();
        require_sync::<data::BarLoader>();
        require_send::<data::MemoryBarSource>();
        require_sync::<data::MemoryBarSource>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        require_send::<strategy::StrategyKind>();
        require_sync::<strategy::StrategyKind>();
        // Strategies move into worker threads; they need not be shared.
        require_send::<Box<dyn strategy::Strategy>>();
    }
}
