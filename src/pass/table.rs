//! Builtin lowering catalog
//!
//! Builtins map either to a single target intrinsic or to a producer /
//! consumer pair of intrinsics. A handful of families are matched by name
//! prefix instead of appearing in the table.

use crate::ir::IntrinsicId;
use crate::ir::IntrinsicId::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

const ONE_STEP: &[(&str, IntrinsicId)] = &[
    // float-to-float
    ("__builtin_IB_frnd_ne", GenxRnde),
    ("__builtin_IB_ftoh_rtn", GenxRndd),
    ("__builtin_IB_ftoh_rtp", GenxRndu),
    ("__builtin_IB_ftoh_rtz", GenxRndz),
    ("__builtin_IB_dtoh_rtn", GenxRnde),
    ("__builtin_IB_dtoh_rtp", GenxRndu),
    ("__builtin_IB_dtoh_rtz", GenxRndz),
    ("__builtin_IB_dtof_rtn", GenxRnde),
    ("__builtin_IB_dtof_rtp", GenxRndu),
    ("__builtin_IB_dtof_rtz", GenxRndz),
    // math
    ("__builtin_IB_frnd_pi", GenxRndu),
    ("__builtin_IB_frnd_ni", GenxRndd),
    ("__builtin_IB_frnd_zi", GenxRndz),
    ("__builtin_IB_native_cosf", GenxCos),
    ("__builtin_IB_native_cosh", GenxCos),
    ("__builtin_IB_native_sinf", GenxSin),
    ("__builtin_IB_native_sinh", GenxSin),
    ("__builtin_IB_native_exp2f", GenxExp),
    ("__builtin_IB_native_exp2h", GenxExp),
    ("__builtin_IB_native_log2f", GenxLog),
    ("__builtin_IB_native_log2h", GenxLog),
    ("__builtin_IB_native_sqrtf", GenxSqrt),
    ("__builtin_IB_native_sqrth", GenxSqrt),
    ("__builtin_IB_native_sqrtd", GenxSqrt),
    ("__builtin_IB_popcount_1u32", GenxCbit),
    ("__builtin_IB_popcount_1u16", GenxCbit),
    ("__builtin_IB_popcount_1u8", GenxCbit),
    ("__builtin_IB_native_powrf", GenxPow),
    ("__builtin_IB_fma", Fma),
    ("__builtin_IB_fmah", Fma),
    ("__builtin_IB_bfrev", GenxBfrev),
    ("__builtin_IB_fmax", GenxFmax),
    ("__builtin_IB_fmin", GenxFmin),
    ("__builtin_IB_HMAX", GenxFmax),
    ("__builtin_IB_HMIN", GenxFmin),
    ("__builtin_IB_dmin", GenxFmin),
    ("__builtin_IB_dmax", GenxFmax),
    // ieee
    ("__builtin_IB_ieee_sqrt", GenxIeeeSqrt),
    ("__builtin_IB_ieee_divide", GenxIeeeDiv),
    ("__builtin_IB_ieee_divide_f64", GenxIeeeDiv),
];

const TWO_STEP: &[(&str, IntrinsicId, IntrinsicId)] = &[
    ("__builtin_IB_dtoi8_rtn", GenxRndd, GenxFptosiSat),
    ("__builtin_IB_dtoi8_rtp", GenxRndu, GenxFptosiSat),
    ("__builtin_IB_dtoi8_rte", GenxRnde, GenxFptosiSat),
    ("__builtin_IB_dtoi16_rtn", GenxRndd, GenxFptosiSat),
    ("__builtin_IB_dtoi16_rtp", GenxRndu, GenxFptosiSat),
    ("__builtin_IB_dtoi16_rte", GenxRnde, GenxFptosiSat),
    ("__builtin_IB_dtoi32_rtn", GenxRndd, GenxFptosiSat),
    ("__builtin_IB_dtoi32_rtp", GenxRndu, GenxFptosiSat),
    ("__builtin_IB_dtoi32_rte", GenxRnde, GenxFptosiSat),
    ("__builtin_IB_dtoi64_rtn", GenxRndd, GenxFptosiSat),
    ("__builtin_IB_dtoi64_rtp", GenxRndu, GenxFptosiSat),
    ("__builtin_IB_dtoi64_rte", GenxRnde, GenxFptosiSat),
    ("__builtin_IB_dtoui8_rtn", GenxRndd, GenxFptouiSat),
    ("__builtin_IB_dtoui8_rtp", GenxRndu, GenxFptouiSat),
    ("__builtin_IB_dtoui8_rte", GenxRnde, GenxFptouiSat),
    ("__builtin_IB_dtoui16_rtn", GenxRndd, GenxFptouiSat),
    ("__builtin_IB_dtoui16_rtp", GenxRndu, GenxFptouiSat),
    ("__builtin_IB_dtoui16_rte", GenxRnde, GenxFptouiSat),
    ("__builtin_IB_dtoui32_rtn", GenxRndd, GenxFptouiSat),
    ("__builtin_IB_dtoui32_rtp", GenxRndu, GenxFptouiSat),
    ("__builtin_IB_dtoui32_rte", GenxRnde, GenxFptouiSat),
    ("__builtin_IB_dtoui64_rtn", GenxRndd, GenxFptouiSat),
    ("__builtin_IB_dtoui64_rtp", GenxRndu, GenxFptouiSat),
    ("__builtin_IB_dtoui64_rte", GenxRnde, GenxFptouiSat),
    ("__builtin_IB_fma_rtz_f64", Fma, GenxRndz),
    ("__builtin_IB_fma_rtz_f32", Fma, GenxRndz),
];

/// How a table entry lowers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lowering {
    OneStep(IntrinsicId),
    /// Producer, then consumer of the producer's result
    TwoStep(IntrinsicId, IntrinsicId),
}

/// Builtin families recognised by name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixRule {
    SignedToFloat,
    UnsignedToFloat,
    MulRoundToZero,
    AddRoundToZero,
}

const PREFIX_RULES: &[(&str, PrefixRule)] = &[
    ("__builtin_IB_itof", PrefixRule::SignedToFloat),
    ("__builtin_IB_uitof", PrefixRule::UnsignedToFloat),
    ("__builtin_IB_mul_rtz", PrefixRule::MulRoundToZero),
    ("__builtin_IB_add_rtz", PrefixRule::AddRoundToZero),
];

impl PrefixRule {
    pub fn match_name(name: &str) -> Option<PrefixRule> {
        PREFIX_RULES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, rule)| *rule)
    }
}

#[derive(Debug)]
pub struct BuiltinTable {
    one_step: HashMap<&'static str, IntrinsicId>,
    two_step: HashMap<&'static str, (IntrinsicId, IntrinsicId)>,
}

static BUILTIN_TABLE: Lazy<BuiltinTable> = Lazy::new(BuiltinTable::build);

impl BuiltinTable {
    /// The shared, immutable catalog.
    pub fn get() -> &'static BuiltinTable {
        &BUILTIN_TABLE
    }

    fn build() -> Self {
        let one_step: HashMap<_, _> = ONE_STEP.iter().copied().collect();
        let two_step: HashMap<_, _> = TWO_STEP
            .iter()
            .map(|(name, producer, consumer)| (*name, (*producer, *consumer)))
            .collect();
        debug_assert!(one_step.keys().all(|name| !two_step.contains_key(name)));
        Self { one_step, two_step }
    }

    pub fn lookup(&self, name: &str) -> Option<Lowering> {
        if let Some(id) = self.one_step.get(name) {
            return Some(Lowering::OneStep(*id));
        }
        self.two_step
            .get(name)
            .map(|(producer, consumer)| Lowering::TwoStep(*producer, *consumer))
    }

    pub fn one_step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.one_step.keys().copied()
    }

    pub fn two_step_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.two_step.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.one_step.len() + self.two_step.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_name_in_both_tables() {
        let table = BuiltinTable::get();
        for name in table.one_step_names() {
            assert!(
                !table.two_step_names().any(|other| other == name),
                "{} is both one-step and two-step",
                name
            );
        }
    }

    #[test]
    fn test_table_has_no_duplicate_rows() {
        let table = BuiltinTable::get();
        assert!(!table.is_empty());
        assert_eq!(table.len(), ONE_STEP.len() + TWO_STEP.len());
    }

    #[test]
    fn test_lookup() {
        let table = BuiltinTable::get();
        assert_eq!(
            table.lookup("__builtin_IB_native_sqrtf"),
            Some(Lowering::OneStep(GenxSqrt))
        );
        assert_eq!(
            table.lookup("__builtin_IB_dtoui16_rtp"),
            Some(Lowering::TwoStep(GenxRndu, GenxFptouiSat))
        );
        assert_eq!(table.lookup("__builtin_IB_itof_f32"), None);
        assert_eq!(table.lookup("my_function"), None);
    }

    #[test]
    fn test_prefix_rules() {
        assert_eq!(PrefixRule::match_name("__builtin_IB_itof_f32"), Some(PrefixRule::SignedToFloat));
        assert_eq!(PrefixRule::match_name("__builtin_IB_uitof_f64"), Some(PrefixRule::UnsignedToFloat));
        assert_eq!(PrefixRule::match_name("__builtin_IB_mul_rtz_f32"), Some(PrefixRule::MulRoundToZero));
        assert_eq!(PrefixRule::match_name("__builtin_IB_add_rtz_f64"), Some(PrefixRule::AddRoundToZero));
        assert_eq!(PrefixRule::match_name("__builtin_IB_native_sqrtf"), None);
    }
}
