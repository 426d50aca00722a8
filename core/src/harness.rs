//! Scenario runner.
//!
//! A scenario runs exactly once:
//!   1. Freeze the clock (scenario instant, else config instant, else "now").
//!   2. Run setup, which builds fixtures against the frozen clock.
//!   3. Compute the scope's range from the clock's reading after setup.
//!   4. Filter the setup records and hand the matches to the assertion.
//!   5. Restore the clock on every exit path: Ok, Err, or panic.
//!
//! The harness never shares its clock between concurrently running
//! scenarios; give each execution context its own `Harness`.

use crate::{
    calendar::CalendarRange,
    clock::Clock,
    config::HarnessConfig,
    error::{HarnessError, HarnessResult},
    fixture::{FixtureDefinition, FixtureRegistry, Overrides},
    scope::{check_equivalence, filter, Equivalence, Scope, ScopeBackend},
    types::{Instant, Record},
};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;

/// What an assertion closure may return.
pub trait AssertionOutcome {
    fn into_outcome(self) -> Result<(), String>;
}

impl AssertionOutcome for bool {
    fn into_outcome(self) -> Result<(), String> {
        if self { Ok(()) } else { Err("assertion returned false".to_string()) }
    }
}

impl AssertionOutcome for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: Display> AssertionOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name:      String,
    pub scope:     Scope,
    pub frozen_at: Option<Instant>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self { name: name.into(), scope, frozen_at: None }
    }

    pub fn frozen_at(mut self, at: Instant) -> Self {
        self.frozen_at = Some(at);
        self
    }
}

/// Handed to scenario setup: fixture building against the frozen clock.
pub struct ScenarioContext<'h> {
    fixtures: &'h mut FixtureRegistry,
}

impl ScenarioContext<'_> {
    pub fn clock(&self) -> &Clock {
        self.fixtures.clock()
    }

    pub fn now(&self) -> Instant {
        self.fixtures.clock().now()
    }

    pub fn build(&mut self, kind: &str, overrides: &Overrides) -> HarnessResult<Record> {
        self.fixtures.build(kind, overrides)
    }

    pub fn build_list(&mut self, kind: &str, count: usize, overrides: &Overrides) -> HarnessResult<Vec<Record>> {
        self.fixtures.build_list(kind, count, overrides)
    }

    pub fn fixtures(&mut self) -> &mut FixtureRegistry {
        &mut *self.fixtures
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub name:         String,
    pub frozen_at:    Instant,
    /// Clock reading the range was computed from (differs from `frozen_at`
    /// only if setup moved the clock).
    pub evaluated_at: Instant,
    pub range:        CalendarRange,
    pub total:        usize,
    pub matched:      Vec<Record>,
}

pub struct Harness {
    clock:    Arc<Clock>,
    fixtures: FixtureRegistry,
    config:   HarnessConfig,
}

impl Harness {
    /// A harness with an explicit seed. `TIMESCOPE_SEED` is not consulted.
    pub fn new(clock: Arc<Clock>, seed: u64) -> Self {
        let config = HarnessConfig { seed: Some(seed), ..HarnessConfig::default() };
        Self::assemble(clock, config)
    }

    /// A harness from `config`, with `TIMESCOPE_SEED` taking precedence over
    /// the configured seed so a logged seed can be replayed.
    pub fn from_config(clock: Arc<Clock>, config: &HarnessConfig) -> HarnessResult<Self> {
        let config = config.clone().with_env_overrides()?;
        Ok(Self::assemble(clock, config))
    }

    fn assemble(clock: Arc<Clock>, config: HarnessConfig) -> Self {
        Self {
            fixtures: FixtureRegistry::new(Arc::clone(&clock), config.resolved_seed()),
            clock,
            config,
        }
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn fixtures(&mut self) -> &mut FixtureRegistry {
        &mut self.fixtures
    }

    pub fn register(&mut self, definition: FixtureDefinition) -> HarnessResult<()> {
        self.fixtures.register(definition)
    }

    /// A "N months ago" scenario on the configured timestamp attribute.
    pub fn months_ago_scenario(&self, name: &str, n: u32) -> Scenario {
        Scenario::new(name, Scope::months_ago(name, self.config.timestamp_attribute.as_str(), n))
    }

    pub fn run_scenario<S, A, O>(
        &mut self,
        scenario: &Scenario,
        setup: S,
        assertion: A,
    ) -> HarnessResult<ScenarioReport>
    where
        S: FnOnce(&mut ScenarioContext<'_>) -> HarnessResult<Vec<Record>>,
        A: FnOnce(&[Record]) -> O,
        O: AssertionOutcome,
    {
        self.frozen(scenario, |fixtures, frozen_at| {
            let mut ctx = ScenarioContext { fixtures };
            let records = setup(&mut ctx)?;
            let evaluated_at = ctx.now();
            let range = scenario.scope.range(evaluated_at)?;
            let matched = filter(&records, &scenario.scope.attribute, &range)?;
            log::info!(
                "scenario '{}': {} of {} record(s) in [{}, {}]",
                scenario.name,
                matched.len(),
                records.len(),
                range.start(),
                range.end(),
            );

            assertion(&matched)
                .into_outcome()
                .map_err(|message| HarnessError::AssertionFailed {
                    scenario: scenario.name.clone(),
                    message,
                })?;

            Ok(ScenarioReport {
                name: scenario.name.clone(),
                frozen_at,
                evaluated_at,
                range,
                total: records.len(),
                matched,
            })
        })
    }

    /// Mirror the setup records into `backend`, query it for the scenario's
    /// scope, and compare with `filter`. The backend is cleared afterwards.
    pub fn verify_backend<S, B>(
        &mut self,
        scenario: &Scenario,
        setup: S,
        backend: &mut B,
    ) -> HarnessResult<Equivalence>
    where
        S: FnOnce(&mut ScenarioContext<'_>) -> HarnessResult<Vec<Record>>,
        B: ScopeBackend + ?Sized,
    {
        self.frozen(scenario, |fixtures, _| {
            let mut ctx = ScenarioContext { fixtures };
            let records = setup(&mut ctx)?;
            let range = scenario.scope.range(ctx.now())?;

            let checked = backend
                .insert(&records)
                .and_then(|()| check_equivalence(&*backend, &records, &scenario.scope.attribute, &range));
            let cleared = backend.clear();
            let equivalence = checked?;
            cleared?;
            Ok(equivalence)
        })
    }

    fn frozen<T>(
        &mut self,
        scenario: &Scenario,
        body: impl FnOnce(&mut FixtureRegistry, Instant) -> HarnessResult<T>,
    ) -> HarnessResult<T> {
        let at = scenario
            .frozen_at
            .or(self.config.frozen_at)
            .unwrap_or_else(|| self.clock.now());
        log::info!("scenario '{}' starting at {at}", scenario.name);
        let fixtures = &mut self.fixtures;
        let result = self.clock.with_frozen(at, |_| body(fixtures, at))?;
        log::info!("scenario '{}' finished (ok: {})", scenario.name, result.is_ok());
        result
    }
}
