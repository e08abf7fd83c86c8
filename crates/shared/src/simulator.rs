//! Single-process execution of the contract circuits, with no wallet, proof
//! server or node involved. Transitions go through the same
//! [`Contract::apply`] the network sessions use.

use crate::contract::{
    CircuitCall, Contract, ContractAddress, ContractError, CounterContract, CounterLedger,
    Increment, RegisterPatient, RegistryContract, RegistryLedger, RegistryStats,
};
use crate::patient::ConditionHash;

/// Bookkeeping a local run keeps in place of real proofs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofLocalState {
    pub circuits_run: u64,
    pub last_circuit: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitContext<L, P> {
    pub address: ContractAddress,
    pub ledger: L,
    pub private_state: P,
    pub proof_local: ProofLocalState,
}

pub struct Simulator<C: Contract> {
    context: CircuitContext<C::Ledger, C::PrivateState>,
}

impl<C: Contract> Simulator<C> {
    pub fn with_args(args: &C::Args) -> Self {
        Self {
            context: CircuitContext {
                address: ContractAddress::derive(C::NAME, "simulator", &[0u8; 32]),
                ledger: C::initial_ledger(args),
                private_state: C::initial_private_state(),
                proof_local: ProofLocalState::default(),
            },
        }
    }

    /// Applies `call`. On a guard failure the context is left as it was.
    pub fn call(&mut self, call: &C::Call) -> Result<&C::Ledger, ContractError> {
        let context = &mut self.context;
        C::apply(&mut context.ledger, &mut context.private_state, call)?;
        context.proof_local.circuits_run += 1;
        context.proof_local.last_circuit = Some(call.circuit_name());
        Ok(&context.ledger)
    }

    pub fn ledger(&self) -> &C::Ledger {
        &self.context.ledger
    }

    pub fn context(&self) -> &CircuitContext<C::Ledger, C::PrivateState> {
        &self.context
    }
}

pub type RegistrySimulator = Simulator<RegistryContract>;
pub type CounterSimulator = Simulator<CounterContract>;

impl Simulator<RegistryContract> {
    pub fn new() -> Self {
        Self::with_args(&RegistryLedger::default())
    }

    pub fn register_patient(
        &mut self,
        age: u8,
        gender: u8,
        condition_hash: ConditionHash,
    ) -> Result<RegistryLedger, ContractError> {
        self.call(&RegisterPatient {
            age,
            gender,
            condition_hash,
        })
        .copied()
    }

    pub fn get_registration_stats(&self) -> RegistryStats {
        *self.ledger()
    }

    pub fn verify_age_range(&self, age: u8, min: u8, max: u8) -> bool {
        RegistryContract::verify_age_range(age, min, max)
    }
}

impl Default for Simulator<RegistryContract> {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator<CounterContract> {
    pub fn new(initial_value: u64) -> Self {
        Self::with_args(&initial_value)
    }

    pub fn increment(&mut self) -> Result<CounterLedger, ContractError> {
        self.call(&Increment).copied()
    }

    pub fn round(&self) -> u64 {
        self.ledger().round
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{hash_condition, Gender};
    use crate::validation::validate_age;

    #[test]
    fn test_fresh_registry_is_empty() {
        let sim = RegistrySimulator::new();
        assert_eq!(sim.get_registration_stats().as_tuple(), (0, 0, 0, 0));
        assert_eq!(sim.context().proof_local, ProofLocalState::default());
    }

    #[test]
    fn test_single_female_registration() {
        let mut sim = RegistrySimulator::new();
        let age = validate_age(45).unwrap();

        let ledger = sim
            .register_patient(age, Gender::Female.code(), hash_condition("diabetes"))
            .unwrap();

        assert_eq!(ledger.as_tuple(), (1, 0, 1, 0));
        assert_eq!(sim.get_registration_stats(), ledger);
        assert!(sim.verify_age_range(age, 18, 65));
        assert!(!sim.verify_age_range(age, 70, 80));
        assert_eq!(
            sim.context().private_state.registered_conditions,
            vec![hash_condition("diabetes")]
        );
        assert_eq!(sim.context().proof_local.last_circuit, Some("register_patient"));
    }

    #[test]
    fn test_flu_registration_end_to_end() {
        let mut sim = RegistrySimulator::new();

        let ledger = sim
            .register_patient(45, 1, hash_condition("flu"))
            .unwrap();

        assert_eq!(ledger.as_tuple(), (1, 0, 1, 0));
        assert_eq!(sim.get_registration_stats().as_tuple(), (1, 0, 1, 0));
        assert!(sim.verify_age_range(45, 18, 65));
        assert!(!sim.verify_age_range(45, 70, 80));
    }

    #[test]
    fn test_buckets_sum_to_total() {
        let mut sim = RegistrySimulator::new();
        let codes = [0u8, 1, 2, 1, 1, 0, 7, 2, 1, 0];

        for (i, code) in codes.iter().enumerate() {
            sim.register_patient(20 + i as u8, *code, hash_condition(&format!("c{i}")))
                .unwrap();
        }

        let (total, male, female, other) = sim.get_registration_stats().as_tuple();
        assert_eq!(total, codes.len() as u64);
        assert_eq!((male, female, other), (3, 4, 3));
        assert_eq!(male + female + other, total);
    }

    #[test]
    fn test_rejected_call_leaves_context_untouched() {
        let mut sim = RegistrySimulator::new();
        sim.register_patient(30, 0, hash_condition("flu")).unwrap();
        let before = sim.context().clone();

        let err = sim
            .register_patient(151, 0, hash_condition("flu"))
            .unwrap_err();

        assert!(matches!(err, ContractError::GuardFailed { .. }));
        assert_eq!(sim.context(), &before);
    }

    #[test]
    fn test_counter_simulator() {
        let mut sim = CounterSimulator::new(2);
        sim.increment().unwrap();
        assert_eq!(sim.increment().unwrap().round, 4);
        assert_eq!(sim.round(), 4);
        assert_eq!(sim.context().proof_local.circuits_run, 2);
    }
}
