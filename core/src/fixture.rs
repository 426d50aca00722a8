//! Fixture definitions and the registry that builds records from them.
//!
//! RULES:
//!   - An explicit override always wins over the default generator.
//!   - Identifying / display attributes default to sequence-backed values,
//!     unique per (kind, attribute) within a registry.
//!   - Flag, enum and bounded-integer attributes ALWAYS default to a uniform
//!     draw from their domain. There is no fixed default for them: a test
//!     that silently depends on one value must fail intermittently, which
//!     is how the hidden precondition gets noticed and made explicit.
//!   - Attributes are generated in declaration order so a seed replays the
//!     same build sequence.

use crate::{
    clock::Clock,
    error::{HarnessError, HarnessResult},
    name_generator::NameGenerator,
    rng::{FixtureRng, RngBank, StreamSlot},
    types::{AttrValue, Instant, Record, RecordId},
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// The set of values an attribute may take. Overrides are checked against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    Text,
    Integer { min: i64, max: i64 },
    Flag,
    OneOf(Vec<String>),
    Timestamp,
}

impl Domain {
    /// `Ok` if `value` belongs to the domain, otherwise a reason.
    pub fn admits(&self, value: &AttrValue) -> Result<(), String> {
        match (self, value) {
            (Self::Text, AttrValue::Text(_)) => Ok(()),
            (Self::Flag, AttrValue::Flag(_)) => Ok(()),
            (Self::Timestamp, AttrValue::Timestamp(_)) => Ok(()),
            (Self::Integer { min, max }, AttrValue::Integer(n)) => {
                if (*min..=*max).contains(n) {
                    Ok(())
                } else {
                    Err(format!("{n} is outside {min}..={max}"))
                }
            }
            (Self::OneOf(values), AttrValue::Text(s)) => {
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(format!("'{s}' is not one of [{}]", values.join(", ")))
                }
            }
            (domain, value) => Err(format!("expected {domain}, got {}", value.type_name())),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text                 => write!(f, "text"),
            Self::Integer { min, max } => write!(f, "integer in {min}..={max}"),
            Self::Flag                 => write!(f, "flag"),
            Self::OneOf(values)        => write!(f, "one of [{}]", values.join(", ")),
            Self::Timestamp            => write!(f, "timestamp"),
        }
    }
}

/// Inputs available to a default generator for one attribute of one build.
pub struct GenContext<'a> {
    /// The clock reading taken once at the start of the build.
    pub now:      Instant,
    /// Per (kind, attribute) counter, starting at 1.
    pub sequence: u64,
    pub rng:      &'a mut FixtureRng,
}

type SequenceFn = dyn Fn(u64) -> AttrValue + Send + Sync;
type GeneratorFn = dyn Fn(&mut GenContext<'_>) -> AttrValue + Send + Sync;

#[derive(Clone)]
enum DefaultValue {
    Sequence(Arc<SequenceFn>),
    Uniform,
    Now,
    Generated(Arc<GeneratorFn>),
}

/// How one attribute is typed and defaulted.
#[derive(Clone)]
pub struct AttributeSpec {
    domain:  Domain,
    default: DefaultValue,
}

impl AttributeSpec {
    /// Text built from the attribute's sequence number, e.g. `user{n}@example.com`.
    pub fn text_sequence(f: impl Fn(u64) -> String + Send + Sync + 'static) -> Self {
        Self {
            domain:  Domain::Text,
            default: DefaultValue::Sequence(Arc::new(move |n| AttrValue::Text(f(n)))),
        }
    }

    /// 1, 2, 3, ...
    pub fn integer_sequence() -> Self {
        Self {
            domain:  Domain::Integer { min: 1, max: i64::MAX },
            default: DefaultValue::Sequence(Arc::new(|n| {
                AttrValue::Integer(i64::try_from(n).unwrap_or(i64::MAX))
            })),
        }
    }

    /// A readable "First Last <seq>" display name.
    pub fn person_name() -> Self {
        Self::text_with(|ctx| NameGenerator::sequenced_full_name(ctx.rng, ctx.sequence))
    }

    pub fn text_with(f: impl Fn(&mut GenContext<'_>) -> String + Send + Sync + 'static) -> Self {
        Self {
            domain:  Domain::Text,
            default: DefaultValue::Generated(Arc::new(move |ctx| AttrValue::Text(f(ctx)))),
        }
    }

    /// Boolean mode attribute; defaults to a fair coin.
    pub fn flag() -> Self {
        Self { domain: Domain::Flag, default: DefaultValue::Uniform }
    }

    /// Enum-like attribute; defaults to a uniform pick from `values`.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domain:  Domain::OneOf(values.into_iter().map(Into::into).collect()),
            default: DefaultValue::Uniform,
        }
    }

    /// Bounded integer; defaults to a uniform draw from `min..=max`.
    pub fn integer_between(min: i64, max: i64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self { domain: Domain::Integer { min, max }, default: DefaultValue::Uniform }
    }

    /// Timestamp defaulting to the clock reading at build time.
    pub fn timestamp_now() -> Self {
        Self { domain: Domain::Timestamp, default: DefaultValue::Now }
    }

    /// Timestamp computed from the build context, e.g. relative to `ctx.now`.
    pub fn timestamp_with(f: impl Fn(&mut GenContext<'_>) -> Instant + Send + Sync + 'static) -> Self {
        Self {
            domain:  Domain::Timestamp,
            default: DefaultValue::Generated(Arc::new(move |ctx| AttrValue::Timestamp(f(ctx)))),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    fn generate(&self, ctx: &mut GenContext<'_>) -> AttrValue {
        match &self.default {
            DefaultValue::Sequence(f) => f(ctx.sequence),
            DefaultValue::Now => AttrValue::Timestamp(ctx.now),
            DefaultValue::Generated(f) => f(ctx),
            DefaultValue::Uniform => match &self.domain {
                Domain::Flag => AttrValue::Flag(ctx.rng.next_u64_below(2) == 1),
                Domain::Integer { min, max } => AttrValue::Integer(ctx.rng.next_i64_between(*min, *max)),
                // Registration rejects empty OneOf domains.
                Domain::OneOf(values) => {
                    AttrValue::Text(ctx.rng.pick(values).cloned().unwrap_or_default())
                }
                Domain::Text => AttrValue::Text(format!("text-{}", ctx.sequence)),
                Domain::Timestamp => AttrValue::Timestamp(ctx.now),
            },
        }
    }
}

impl fmt::Debug for AttributeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let default = match self.default {
            DefaultValue::Sequence(_)  => "sequence",
            DefaultValue::Uniform      => "uniform",
            DefaultValue::Now          => "now",
            DefaultValue::Generated(_) => "generated",
        };
        f.debug_struct("AttributeSpec")
            .field("domain", &self.domain)
            .field("default", &default)
            .finish()
    }
}

/// How to build records of one kind. Read-only once registered.
#[derive(Debug, Clone)]
pub struct FixtureDefinition {
    kind:       String,
    attributes: Vec<(String, AttributeSpec)>,
}

impl FixtureDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), attributes: Vec::new() }
    }

    /// Declare an attribute. Redeclaring a name replaces it in place.
    pub fn attribute(mut self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        let name = name.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = spec,
            None => self.attributes.push((name, spec)),
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(n, _)| n.as_str())
    }

    /// Attribute names and domains in declaration order.
    pub fn shape(&self) -> Vec<(&str, &Domain)> {
        self.attributes.iter().map(|(n, spec)| (n.as_str(), &spec.domain)).collect()
    }
}

/// Call-site attribute values that replace defaults for one build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides(BTreeMap<String, AttrValue>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Overrides {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Registered definitions plus the sequence counters and RNG streams that
/// back their defaults.
pub struct FixtureRegistry {
    clock:       Arc<Clock>,
    bank:        RngBank,
    definitions: HashMap<String, FixtureDefinition>,
    sequences:   HashMap<(String, String), u64>,
    ids:         FixtureRng,
    values:      FixtureRng,
}

impl FixtureRegistry {
    pub fn new(clock: Arc<Clock>, seed: u64) -> Self {
        log::info!("fixture seed {seed:#018x} (replay with TIMESCOPE_SEED={seed})");
        let bank = RngBank::new(seed);
        Self {
            ids:         bank.for_stream(StreamSlot::Identity),
            values:      bank.for_stream(StreamSlot::Values),
            bank,
            clock,
            definitions: HashMap::new(),
            sequences:   HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.bank.master_seed()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.definitions.contains_key(kind)
    }

    pub fn definition(&self, kind: &str) -> Option<&FixtureDefinition> {
        self.definitions.get(kind)
    }

    /// Register a kind. Registering the same shape again is a no-op; a
    /// different shape under a taken name is `DuplicateKind`.
    pub fn register(&mut self, definition: FixtureDefinition) -> HarnessResult<()> {
        if let Some(existing) = self.definitions.get(definition.kind()) {
            if existing.shape() == definition.shape() {
                log::debug!("fixture kind '{}' already registered", definition.kind());
                return Ok(());
            }
            return Err(HarnessError::DuplicateKind { kind: definition.kind().to_string() });
        }
        for (name, spec) in &definition.attributes {
            if matches!(&spec.domain, Domain::OneOf(values) if values.is_empty()) {
                return Err(HarnessError::Other(anyhow::anyhow!(
                    "attribute '{}.{name}' declares an empty domain",
                    definition.kind()
                )));
            }
        }
        log::debug!(
            "registered fixture kind '{}' with {} attribute(s)",
            definition.kind(),
            definition.attributes.len()
        );
        self.definitions.insert(definition.kind().to_string(), definition);
        Ok(())
    }

    /// Build one record of `kind`. Overrides win; everything else is defaulted.
    pub fn build(&mut self, kind: &str, overrides: &Overrides) -> HarnessResult<Record> {
        let definition = self
            .definitions
            .get(kind)
            .ok_or_else(|| HarnessError::UnknownKind { kind: kind.to_string() })?;

        for (name, value) in overrides.iter() {
            let spec = definition.spec(name).ok_or_else(|| HarnessError::InvalidOverride {
                kind:      kind.to_string(),
                attribute: name.clone(),
                reason:    "attribute is not declared".to_string(),
            })?;
            spec.domain.admits(value).map_err(|reason| HarnessError::InvalidOverride {
                kind: kind.to_string(),
                attribute: name.clone(),
                reason,
            })?;
        }

        let now = self.clock.now();
        let mut attributes = BTreeMap::new();
        for (name, spec) in &definition.attributes {
            let value = match overrides.get(name) {
                Some(value) => value.clone(),
                None => {
                    let counter = self
                        .sequences
                        .entry((kind.to_string(), name.clone()))
                        .or_insert(0);
                    *counter += 1;
                    let mut ctx = GenContext { now, sequence: *counter, rng: &mut self.values };
                    spec.generate(&mut ctx)
                }
            };
            attributes.insert(name.clone(), value);
        }

        let mut bytes = [0u8; 16];
        self.ids.fill_bytes(&mut bytes);
        let id = RecordId::from_uuid(uuid::Builder::from_random_bytes(bytes).into_uuid());

        Ok(Record::new(id, kind, attributes))
    }

    pub fn build_list(
        &mut self,
        kind: &str,
        count: usize,
        overrides: &Overrides,
    ) -> HarnessResult<Vec<Record>> {
        (0..count).map(|_| self.build(kind, overrides)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ymd;

    fn registry() -> FixtureRegistry {
        let clock = Arc::new(Clock::system());
        clock.freeze(ymd(2017, 5, 6).unwrap());
        FixtureRegistry::new(clock, 0xC0FFEE)
    }

    #[test]
    fn domain_admits_matching_values_only() {
        let mode = Domain::OneOf(vec!["draft".into(), "live".into()]);
        assert!(mode.admits(&"live".into()).is_ok());
        assert!(mode.admits(&"archived".into()).is_err());
        assert!(mode.admits(&true.into()).is_err());

        let score = Domain::Integer { min: 0, max: 10 };
        assert!(score.admits(&AttrValue::Integer(10)).is_ok());
        assert!(score.admits(&AttrValue::Integer(11)).is_err());
    }

    #[test]
    fn redeclared_attribute_replaces_in_place() {
        let def = FixtureDefinition::new("user")
            .attribute("name", AttributeSpec::person_name())
            .attribute("admin", AttributeSpec::flag())
            .attribute("name", AttributeSpec::text_sequence(|n| format!("u{n}")));
        let names: Vec<&str> = def.attribute_names().collect();
        assert_eq!(names, ["name", "admin"]);
    }

    #[test]
    fn empty_enum_domain_is_rejected() {
        let mut reg = registry();
        let def = FixtureDefinition::new("post").attribute("state", AttributeSpec::one_of(Vec::<String>::new()));
        assert!(reg.register(def).is_err());
        assert!(!reg.is_registered("post"));
    }

    #[test]
    fn sequences_are_per_attribute() {
        let mut reg = registry();
        reg.register(
            FixtureDefinition::new("user")
                .attribute("id", AttributeSpec::integer_sequence())
                .attribute("email", AttributeSpec::text_sequence(|n| format!("user{n}@example.com"))),
        )
        .unwrap();
        let first = reg.build("user", &Overrides::new()).unwrap();
        let second = reg.build("user", &Overrides::new().set("id", 99i64)).unwrap();
        let third = reg.build("user", &Overrides::new()).unwrap();

        assert_eq!(first.get("id"), Some(&AttrValue::Integer(1)));
        assert_eq!(second.get("id"), Some(&AttrValue::Integer(99)));
        // Overridden builds do not consume the sequence.
        assert_eq!(third.get("id"), Some(&AttrValue::Integer(2)));
        assert_eq!(third.get("email"), Some(&AttrValue::Text("user3@example.com".into())));
    }
}
