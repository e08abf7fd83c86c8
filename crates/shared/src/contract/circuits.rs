//! State-transition rules of the two contracts this tool drives.
//!
//! Both the network-facing [`ContractSession`](super::ContractSession) and
//! the in-process simulators apply transitions through [`Contract::apply`],
//! so a ledger evolves identically in either place.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::patient::{ConditionHash, Gender, FIELD_MODULUS, MAX_AGE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardViolation {
    pub circuit: &'static str,
    pub condition: String,
}

impl GuardViolation {
    fn new(circuit: &'static str, condition: impl Into<String>) -> Self {
        Self {
            circuit,
            condition: condition.into(),
        }
    }
}

pub trait CircuitCall: Serialize + Debug + Send + Sync {
    fn circuit_name(&self) -> &'static str;
}

pub trait Contract: Send + Sync + 'static {
    const NAME: &'static str;

    type Args: Serialize + Debug + Send + Sync;
    type Ledger: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Send + Sync;
    type PrivateState: Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync;
    type Call: CircuitCall;

    fn initial_ledger(args: &Self::Args) -> Self::Ledger;

    fn initial_private_state() -> Self::PrivateState {
        Self::PrivateState::default()
    }

    /// Checks the circuit's guards and, only if all hold, applies the
    /// transition in place.
    fn apply(
        ledger: &mut Self::Ledger,
        private_state: &mut Self::PrivateState,
        call: &Self::Call,
    ) -> Result<(), GuardViolation>;
}

// Counter

pub struct CounterContract;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterLedger {
    pub round: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Increment;

impl CircuitCall for Increment {
    fn circuit_name(&self) -> &'static str {
        "increment"
    }
}

impl Contract for CounterContract {
    const NAME: &'static str = "counter";

    type Args = u64;
    type Ledger = CounterLedger;
    type PrivateState = ();
    type Call = Increment;

    fn initial_ledger(initial_value: &u64) -> CounterLedger {
        CounterLedger {
            round: *initial_value,
        }
    }

    fn apply(
        ledger: &mut CounterLedger,
        _private_state: &mut (),
        call: &Increment,
    ) -> Result<(), GuardViolation> {
        ledger.round = ledger
            .round
            .checked_add(1)
            .ok_or_else(|| GuardViolation::new(call.circuit_name(), "round counter overflow"))?;
        Ok(())
    }
}

// Patient registry

pub struct RegistryContract;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryLedger {
    pub registration_count: u64,
    pub male_count: u64,
    pub female_count: u64,
    pub other_count: u64,
}

/// Public registry counters, as reported by `verify-stats`.
pub type RegistryStats = RegistryLedger;

impl RegistryLedger {
    /// `(total, male, female, other)`
    pub fn as_tuple(&self) -> (u64, u64, u64, u64) {
        (
            self.registration_count,
            self.male_count,
            self.female_count,
            self.other_count,
        )
    }
}

/// What the registering party keeps off-chain: the condition hashes it has
/// submitted, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPrivateState {
    pub registered_conditions: Vec<ConditionHash>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPatient {
    pub age: u8,
    pub gender: u8,
    pub condition_hash: ConditionHash,
}

impl CircuitCall for RegisterPatient {
    fn circuit_name(&self) -> &'static str {
        "register_patient"
    }
}

impl RegistryContract {
    /// Range membership is evaluated locally; there is no proof-producing
    /// range circuit behind it.
    pub fn verify_age_range(age: u8, min: u8, max: u8) -> bool {
        min <= age && age <= max
    }
}

impl Contract for RegistryContract {
    const NAME: &'static str = "patient-registry";

    type Args = RegistryLedger;
    type Ledger = RegistryLedger;
    type PrivateState = RegistryPrivateState;
    type Call = RegisterPatient;

    fn initial_ledger(initial: &RegistryLedger) -> RegistryLedger {
        *initial
    }

    fn apply(
        ledger: &mut RegistryLedger,
        private_state: &mut RegistryPrivateState,
        call: &RegisterPatient,
    ) -> Result<(), GuardViolation> {
        let circuit = call.circuit_name();
        if i64::from(call.age) > MAX_AGE {
            return Err(GuardViolation::new(circuit, format!("age <= {MAX_AGE}")));
        }
        if call.condition_hash.value() >= FIELD_MODULUS {
            return Err(GuardViolation::new(
                circuit,
                "condition hash < field modulus",
            ));
        }

        let overflow = || GuardViolation::new(circuit, "registration counter overflow");
        let mut next = *ledger;
        next.registration_count = next.registration_count.checked_add(1).ok_or_else(overflow)?;
        let bucket = match Gender::from_code(call.gender) {
            Gender::Male => &mut next.male_count,
            Gender::Female => &mut next.female_count,
            Gender::Other => &mut next.other_count,
        };
        *bucket = bucket.checked_add(1).ok_or_else(overflow)?;

        *ledger = next;
        private_state
            .registered_conditions
            .push(call.condition_hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::hash_condition;
    use alloy::primitives::U256;

    fn register(age: u8, gender: u8) -> RegisterPatient {
        RegisterPatient {
            age,
            gender,
            condition_hash: hash_condition("flu"),
        }
    }

    #[test]
    fn test_increment_adds_one() {
        let mut ledger = CounterContract::initial_ledger(&41);
        CounterContract::apply(&mut ledger, &mut (), &Increment).unwrap();
        assert_eq!(ledger.round, 42);
    }

    #[test]
    fn test_increment_guards_overflow() {
        let mut ledger = CounterContract::initial_ledger(&u64::MAX);
        let err = CounterContract::apply(&mut ledger, &mut (), &Increment).unwrap_err();
        assert_eq!(err.circuit, "increment");
        assert_eq!(ledger.round, u64::MAX);
    }

    #[test]
    fn test_register_bumps_total_and_bucket() {
        let mut ledger = RegistryLedger::default();
        let mut private_state = RegistryPrivateState::default();

        RegistryContract::apply(&mut ledger, &mut private_state, &register(30, 0)).unwrap();
        RegistryContract::apply(&mut ledger, &mut private_state, &register(30, 1)).unwrap();
        RegistryContract::apply(&mut ledger, &mut private_state, &register(30, 2)).unwrap();
        RegistryContract::apply(&mut ledger, &mut private_state, &register(30, 9)).unwrap();

        assert_eq!(ledger.as_tuple(), (4, 1, 1, 2));
        assert_eq!(private_state.registered_conditions.len(), 4);
    }

    #[test]
    fn test_register_rejects_age_over_limit_without_mutation() {
        let mut ledger = RegistryLedger::default();
        let mut private_state = RegistryPrivateState::default();

        let err = RegistryContract::apply(&mut ledger, &mut private_state, &register(151, 1))
            .unwrap_err();
        assert_eq!(err.circuit, "register_patient");
        assert_eq!(err.condition, "age <= 150");
        assert_eq!(ledger, RegistryLedger::default());
        assert!(private_state.registered_conditions.is_empty());
    }

    #[test]
    fn test_register_rejects_unreduced_hash() {
        let mut ledger = RegistryLedger::default();
        let mut private_state = RegistryPrivateState::default();
        let call = RegisterPatient {
            age: 20,
            gender: 0,
            condition_hash: ConditionHash(U256::MAX),
        };

        assert!(RegistryContract::apply(&mut ledger, &mut private_state, &call).is_err());
        assert_eq!(ledger.registration_count, 0);
    }

    #[test]
    fn test_register_overflow_leaves_ledger_untouched() {
        let mut ledger = RegistryLedger {
            registration_count: 5,
            male_count: u64::MAX,
            ..Default::default()
        };
        let before = ledger;
        let mut private_state = RegistryPrivateState::default();

        assert!(RegistryContract::apply(&mut ledger, &mut private_state, &register(20, 0)).is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_verify_age_range_is_inclusive() {
        assert!(RegistryContract::verify_age_range(45, 18, 65));
        assert!(RegistryContract::verify_age_range(18, 18, 65));
        assert!(RegistryContract::verify_age_range(65, 18, 65));
        assert!(!RegistryContract::verify_age_range(45, 70, 80));
    }

    #[test]
    fn test_register_call_serializes_camel_case() {
        let json = serde_json::to_value(register(45, 1)).unwrap();
        assert_eq!(json["age"], 45);
        assert_eq!(json["gender"], 1);
        assert!(json.get("conditionHash").is_some());
    }
}
