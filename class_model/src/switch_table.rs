use crate::instruction::{CodeIndex, Instruction};
use crate::program_error::{ProgramError, Result};

/// Multi-way branch dispatch shared by `tableswitch` and `lookupswitch`.
pub trait BranchTable {
    /// Returns the instruction index control continues at for `key`.
    fn dispatch(&self, key: i32) -> CodeIndex;

    /// Where keys without a case label go.
    fn default_target(&self) -> CodeIndex;
}

/// Dense form: `targets[key - low]` for every key in `[low, high]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    pub low: i32,
    pub high: i32,
    pub targets: Vec<CodeIndex>,
    pub default: CodeIndex,
}

/// Sparse form: `keys` is sorted ascending, `targets[i]` belongs to `keys[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    pub keys: Vec<i32>,
    pub targets: Vec<CodeIndex>,
    pub default: CodeIndex,
}

impl BranchTable for JumpTable {
    fn dispatch(&self, key: i32) -> CodeIndex {
        if key < self.low || key > self.high {
            return self.default;
        }
        // 用 i64 计算，避免 high - low 溢出
        let index = (key as i64 - self.low as i64) as usize;
        self.targets.get(index).copied().unwrap_or(self.default)
    }

    fn default_target(&self) -> CodeIndex {
        self.default
    }
}

impl BranchTable for LookupTable {
    fn dispatch(&self, key: i32) -> CodeIndex {
        match self.keys.binary_search(&key) {
            Ok(index) => self.targets[index],
            Err(_) => self.default,
        }
    }

    fn default_target(&self) -> CodeIndex {
        self.default
    }
}

impl JumpTable {
    pub(crate) fn for_each_target_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut CodeIndex) -> Result<()>,
    {
        for target in self.targets.iter_mut() {
            f(target)?;
        }
        f(&mut self.default)
    }
}

impl LookupTable {
    pub(crate) fn for_each_target_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut CodeIndex) -> Result<()>,
    {
        for target in self.targets.iter_mut() {
            f(target)?;
        }
        f(&mut self.default)
    }
}

/// A compiled `switch`, before it is placed into an instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchTable {
    Dense(JumpTable),
    Sparse(LookupTable),
}

impl SwitchTable {
    /// Picks the dense or the sparse form using the reference compiler's
    /// cost model: a jump table is chosen when
    /// `table_space + 3 * table_time <= lookup_space + 3 * lookup_time`.
    pub fn compile(cases: &[(i32, CodeIndex)], default: CodeIndex) -> Result<SwitchTable> {
        let mut sorted = cases.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        for pair in sorted.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ProgramError::DuplicateCaseLabel(pair[0].0));
            }
        }
        let (low, high) = match (sorted.first(), sorted.last()) {
            (Some((low, _)), Some((high, _))) => (*low as i64, *high as i64),
            _ => {
                return Ok(SwitchTable::Sparse(LookupTable {
                    keys: Vec::new(),
                    targets: Vec::new(),
                    default,
                }))
            }
        };
        let count = sorted.len() as i64;
        let table_space_cost = 4 + (high - low + 1);
        let table_time_cost = 3;
        let lookup_space_cost = 3 + 2 * count;
        let lookup_time_cost = count;
        if table_space_cost + 3 * table_time_cost <= lookup_space_cost + 3 * lookup_time_cost {
            let mut targets = vec![default; (high - low + 1) as usize];
            for (key, target) in &sorted {
                targets[(*key as i64 - low) as usize] = *target;
            }
            Ok(SwitchTable::Dense(JumpTable {
                low: low as i32,
                high: high as i32,
                targets,
                default,
            }))
        } else {
            Ok(SwitchTable::Sparse(LookupTable {
                keys: sorted.iter().map(|(key, _)| *key).collect(),
                targets: sorted.iter().map(|(_, target)| *target).collect(),
                default,
            }))
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, SwitchTable::Dense(_))
    }

    pub fn into_instruction(self) -> Instruction {
        match self {
            SwitchTable::Dense(table) => Instruction::Tableswitch(Box::new(table)),
            SwitchTable::Sparse(table) => Instruction::Lookupswitch(Box::new(table)),
        }
    }
}

impl BranchTable for SwitchTable {
    fn dispatch(&self, key: i32) -> CodeIndex {
        match self {
            SwitchTable::Dense(table) => table.dispatch(key),
            SwitchTable::Sparse(table) => table.dispatch(key),
        }
    }

    fn default_target(&self) -> CodeIndex {
        match self {
            SwitchTable::Dense(table) => table.default,
            SwitchTable::Sparse(table) => table.default,
        }
    }
}
