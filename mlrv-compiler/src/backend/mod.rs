//! The machine backend: code generation, register allocation, execution.
//!
//! The pipeline is `lower` → `allocate` → `resolve targets`. Targets stay
//! symbolic until the allocator has finished inserting spill code, so no
//! absolute index is ever computed against a stream that later changes.

pub mod abi;
pub mod codegen;
pub mod machine;
pub mod regalloc;

pub use codegen::CodeGen;
pub use machine::{
    execute, Instr, Label, Machine, MachineError, Program, ProgramError, Target,
    DEFAULT_MEM_SIZE,
};
pub use regalloc::{AllocError, Loc, RegAllocator};

use crate::ast::Exp;
use crate::CompileError;

/// Where a compiled expression's result lives after allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLoc {
    /// A physical register, by name.
    Reg(String),
    /// A spill memory address.
    Mem(i64),
}

/// A fully compiled expression: allocated program, targets resolved, and the
/// location to read the result from after execution.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub program: Program,
    /// The symbolic register the generator produced the result in.
    pub result_reg: String,
    /// The result's physical location.
    pub result: ResultLoc,
}

impl Compiled {
    /// Execute on a fresh machine and read back the result value.
    pub fn execute(&self, mem_size: usize) -> Result<i64, MachineError> {
        let m = machine::execute(&self.program, mem_size)?;
        match &self.result {
            ResultLoc::Reg(name) => {
                m.get_val(name)
                    .ok_or_else(|| MachineError::UndefinedRegister {
                        name: name.clone(),
                        pc: m.pc(),
                    })
            }
            ResultLoc::Mem(addr) => {
                m.get_mem(*addr as usize)
                    .ok_or(MachineError::OutOfBoundsAccess {
                        addr: *addr,
                        size: mem_size,
                        pc: m.pc(),
                    })
            }
        }
    }
}

/// Lower an expression without register allocation. The returned program
/// still references symbolic registers (and unresolved labels have been
/// bound but not patched); it is directly executable because the machine
/// maps names, not slots — useful for comparing pre- and post-allocation
/// behaviour.
pub fn lower(exp: &Exp) -> (Program, String) {
    let mut prog = Program::new();
    let mut gen = CodeGen::new();
    let result = gen.lower(exp, &mut prog);
    (prog, result)
}

/// Lower, allocate and resolve an expression into a physical-register
/// program.
pub fn compile(exp: &Exp) -> Result<Compiled, CompileError> {
    let mut prog = Program::new();
    let mut gen = CodeGen::new();
    let result_reg = gen.lower(exp, &mut prog);

    let mut alloc = RegAllocator::new();
    alloc.run(&mut prog)?;
    prog.resolve_targets()?;

    let result = if abi::is_physical(&result_reg) {
        ResultLoc::Reg(result_reg.clone())
    } else {
        match alloc.location_of(&result_reg) {
            Some(Loc::Reg(slot)) => ResultLoc::Reg(abi::BANK[slot].to_string()),
            Some(Loc::Mem(addr)) => ResultLoc::Mem(addr),
            None => {
                return Err(CompileError::Alloc(AllocError::UnknownRegister {
                    name: result_reg,
                }))
            }
        }
    };

    Ok(Compiled {
        program: prog,
        result_reg,
        result,
    })
}
