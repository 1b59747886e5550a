use crate::instruction::{CodeIndex, Instruction};
use crate::method_descriptor::{Code, ExceptionRange};
use crate::program_error::{ProgramError, Result};
use crate::switch_table::SwitchTable;
use crate::type_descriptor::MethodSignature;

/// A not-yet-placed position in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

struct PendingRange {
    start: Label,
    end: Label,
    handler: Label,
    catch_type: Option<String>,
}

/// Assembles one method body.
///
/// Branch targets handed to the builder are label ids (from [`fresh_label`]),
/// never raw instruction indices; `build` rewrites every one of them into an
/// absolute index once all labels are placed.
///
/// [`fresh_label`]: CodeBuilder::fresh_label
pub struct CodeBuilder {
    instructions: Vec<Instruction>,
    labels: Vec<Option<CodeIndex>>,
    exception_table: Vec<PendingRange>,
    max_locals: usize,
    max_stack: Option<u16>,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        CodeBuilder::new()
    }
}

impl CodeBuilder {
    pub fn new() -> CodeBuilder {
        CodeBuilder {
            instructions: Vec::new(),
            labels: Vec::new(),
            exception_table: Vec::new(),
            max_locals: 0,
            max_stack: None,
        }
    }

    /// Reserves local slots for `this` (instance methods) and the parameters.
    pub fn for_method(descriptor: &str, is_static: bool) -> Result<CodeBuilder> {
        let signature = MethodSignature::parse(descriptor)?;
        let receiver = if is_static { 0 } else { 1 };
        let mut builder = CodeBuilder::new();
        builder.max_locals = receiver + signature.parameter_slots();
        Ok(builder)
    }

    pub fn fresh_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Binds `label` to the index of the next instruction pushed.
    pub fn place_label(&mut self, label: Label) -> Result<()> {
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => {
                *slot = Some(self.instructions.len());
                Ok(())
            }
            Some(Some(_)) => Err(ProgramError::LabelPlacedTwice(label.0)),
            None => Err(ProgramError::UnboundLabel(label.0)),
        }
    }

    pub fn current_index(&self) -> CodeIndex {
        self.instructions.len()
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        if let Some(slots) = instruction.local_slots_touched() {
            self.max_locals = self.max_locals.max(slots);
        }
        self.instructions.push(instruction);
        self
    }

    /// `code.push_branch(Instruction::Ifeq, else_label)`
    pub fn push_branch<F>(&mut self, branch: F, label: Label) -> &mut Self
    where
        F: FnOnce(CodeIndex) -> Instruction,
    {
        self.push(branch(label.0))
    }

    /// Emits a `tableswitch` or `lookupswitch`, whichever the case density favours.
    pub fn push_switch(&mut self, cases: &[(i32, Label)], default: Label) -> Result<&mut Self> {
        let cases: Vec<(i32, CodeIndex)> = cases.iter().map(|(key, label)| (*key, label.0)).collect();
        let table = SwitchTable::compile(&cases, default.0)?;
        Ok(self.push(table.into_instruction()))
    }

    /// Guards `[start, end)` with `handler`; `catch_type` of `None` catches anything.
    pub fn try_range(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&str>,
    ) -> &mut Self {
        self.exception_table.push(PendingRange {
            start,
            end,
            handler,
            catch_type: catch_type.map(str::to_string),
        });
        self
    }

    pub fn set_max_stack(&mut self, max_stack: u16) -> &mut Self {
        self.max_stack = Some(max_stack);
        self
    }

    pub fn build(self) -> Result<Code> {
        let CodeBuilder {
            mut instructions,
            labels,
            exception_table,
            max_locals,
            max_stack,
        } = self;
        let length = instructions.len();
        let resolve = |label: usize| -> Result<CodeIndex> {
            labels
                .get(label)
                .copied()
                .flatten()
                .ok_or(ProgramError::UnboundLabel(label))
        };

        for (at, instruction) in instructions.iter_mut().enumerate() {
            instruction.for_each_target_mut(|target| {
                let resolved = resolve(*target)?;
                if resolved >= length {
                    return Err(ProgramError::BranchOutOfRange {
                        at,
                        target: resolved,
                    });
                }
                *target = resolved;
                Ok(())
            })?;
        }

        let mut ranges = Vec::with_capacity(exception_table.len());
        for pending in exception_table {
            let range = ExceptionRange {
                start: resolve(pending.start.0)?,
                end: resolve(pending.end.0)?,
                handler: resolve(pending.handler.0)?,
                catch_type: pending.catch_type,
            };
            if range.start >= range.end || range.end > length || range.handler >= length {
                return Err(ProgramError::InvalidExceptionRange {
                    start: range.start,
                    end: range.end,
                    handler: range.handler,
                });
            }
            ranges.push(range);
        }

        // 每条指令至多净压入两个值，按指令数给出保守上界
        let max_stack = max_stack.unwrap_or_else(|| (2 * length).clamp(2, u16::MAX as usize) as u16);
        Ok(Code {
            max_stack,
            max_locals: max_locals.min(u16::MAX as usize) as u16,
            instructions,
            exception_table: ranges,
        })
    }
}
