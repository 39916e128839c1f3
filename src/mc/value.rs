//! Relocatable values.
//!
//! An `McValue` is `constant + &plus_sym - &minus_sym`: the result of
//! folding a symbolic expression as far as assembly time allows. An
//! absolute value has both symbol slots empty; anything that would need
//! more than one symbol per side is not representable and fails to fold.

use std::fmt;

use super::symbol::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McValue {
    pub constant: i64,
    pub plus_sym: Option<SymbolId>,
    pub minus_sym: Option<SymbolId>,
}

impl McValue {
    pub fn absolute(constant: i64) -> Self {
        Self {
            constant,
            plus_sym: None,
            minus_sym: None,
        }
    }

    pub fn symbolic(constant: i64, plus_sym: Option<SymbolId>, minus_sym: Option<SymbolId>) -> Self {
        Self {
            constant,
            plus_sym,
            minus_sym,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.plus_sym.is_none() && self.minus_sym.is_none()
    }

    /// `-(c + A - B)` is `(-c + B - A)`.
    pub fn negated(self) -> Self {
        Self {
            constant: self.constant.wrapping_neg(),
            plus_sym: self.minus_sym,
            minus_sym: self.plus_sym,
        }
    }

    /// Fold `self + rhs`, cancelling symbol pairs. `None` when the result
    /// would need more than one symbol on either side.
    pub fn add(self, rhs: McValue) -> Option<McValue> {
        let mut plus: Vec<SymbolId> = Vec::with_capacity(2);
        let mut minus: Vec<SymbolId> = Vec::with_capacity(2);
        plus.extend(self.plus_sym);
        plus.extend(rhs.plus_sym);
        minus.extend(self.minus_sym);
        minus.extend(rhs.minus_sym);

        // A + ... - A cancels, one pair at a time.
        let mut i = 0;
        while i < plus.len() {
            if let Some(j) = minus.iter().position(|&m| m == plus[i]) {
                minus.remove(j);
                plus.remove(i);
            } else {
                i += 1;
            }
        }

        if plus.len() > 1 || minus.len() > 1 {
            return None;
        }
        Some(McValue {
            constant: self.constant.wrapping_add(rhs.constant),
            plus_sym: plus.first().copied(),
            minus_sym: minus.first().copied(),
        })
    }

    /// Fold `self - rhs`.
    pub fn sub(self, rhs: McValue) -> Option<McValue> {
        self.add(rhs.negated())
    }
}

impl fmt::Display for McValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constant)?;
        if let Some(sym) = self.plus_sym {
            write!(f, "+sym{}", sym.0)?;
        }
        if let Some(sym) = self.minus_sym {
            write!(f, "-sym{}", sym.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SymbolId = SymbolId(0);
    const B: SymbolId = SymbolId(1);

    fn plus(sym: SymbolId) -> McValue {
        McValue::symbolic(0, Some(sym), None)
    }

    #[test]
    fn same_symbol_difference_cancels() {
        let result = plus(A).sub(plus(A)).unwrap();
        assert_eq!(result, McValue::absolute(0));
    }

    #[test]
    fn difference_of_two_symbols() {
        let lhs = McValue::symbolic(3, Some(A), None);
        let rhs = McValue::symbolic(1, Some(B), None);
        assert_eq!(
            lhs.sub(rhs).unwrap(),
            McValue::symbolic(2, Some(A), Some(B))
        );
    }

    #[test]
    fn two_symbols_on_one_side_fail() {
        assert_eq!(plus(A).add(plus(B)), None);
    }

    #[test]
    fn constants_combine_with_either_side() {
        let val = plus(A).add(McValue::absolute(7)).unwrap();
        assert_eq!(val, McValue::symbolic(7, Some(A), None));
        let val = val.sub(McValue::absolute(2)).unwrap();
        assert_eq!(val, McValue::symbolic(5, Some(A), None));
    }

    #[test]
    fn negation_swaps_sides() {
        let val = McValue::symbolic(4, Some(A), Some(B)).negated();
        assert_eq!(val, McValue::symbolic(-4, Some(B), Some(A)));
    }
}
