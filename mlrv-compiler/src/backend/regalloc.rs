//! Register allocation: rewrite a program written with unbounded symbolic
//! registers onto the fixed physical bank plus spill memory.
//!
//! The allocator is a single in-order pass. Victim selection is strict
//! round-robin over the bank, with no liveness information and no LRU; it
//! can thrash, but every allocation decision is O(1).
//!
//! Spill slots are handed out from memory address 0 upward, monotonically,
//! and are never reused within one program. Branch targets are left symbolic
//! while the allocator inserts spill code; already-resolved absolute targets
//! and label bindings are remapped through the old-index → new-index table,
//! so no target is ever stale.

use super::abi;
use super::machine::{Instr, Program};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("operand '{name}' is neither a physical register nor a defined symbolic value")]
    UnknownRegister { name: String },
}

/// Where a symbolic value currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    /// Resident in the bank register with this index.
    Reg(usize),
    /// Spilled to this memory address.
    Mem(i64),
}

const BANK_SIZE: usize = abi::BANK.len();

/// One-shot register allocator. Create, [`run`](Self::run), then query
/// [`location_of`](Self::location_of) for final value placements.
#[derive(Debug, Default)]
pub struct RegAllocator {
    /// Bank slot → resident symbolic value.
    residents: [Option<String>; BANK_SIZE],
    /// Symbolic value → current location.
    locations: HashMap<String, Loc>,
    /// Round-robin victim cursor.
    victim: usize,
    /// Next spill address; monotonic, never reused.
    next_slot: i64,
    /// Bank slots the current instruction has claimed; never victimised.
    pinned: [bool; BANK_SIZE],
}

impl RegAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `prog` in place so that it references only physical
    /// registers, inserting spill stores and reloads as needed.
    pub fn run(&mut self, prog: &mut Program) -> Result<(), AllocError> {
        let old_insts = prog.insts().to_vec();
        let mut out = Vec::with_capacity(old_insts.len());
        let mut index_map = Vec::with_capacity(old_insts.len() + 1);

        for inst in &old_insts {
            index_map.push(out.len());
            self.pinned = [false; BANK_SIZE];
            let rewritten = self.rewrite(inst, &mut out)?;
            out.push(rewritten);
        }
        index_map.push(out.len());

        prog.replace_insts(out, &index_map);
        Ok(())
    }

    /// The final location of a symbolic value, if the allocator placed it.
    pub fn location_of(&self, name: &str) -> Option<Loc> {
        self.locations.get(name).copied()
    }

    // ── Per-instruction rewriting ───────────────────────────────────────

    fn rewrite(&mut self, inst: &Instr, out: &mut Vec<Instr>) -> Result<Instr, AllocError> {
        match inst {
            Instr::Add { rd, rs1, rs2 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Add { rd, rs1, rs2 })
            }
            Instr::Sub { rd, rs1, rs2 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Sub { rd, rs1, rs2 })
            }
            Instr::Mul { rd, rs1, rs2 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Mul { rd, rs1, rs2 })
            }
            Instr::Div { rd, rs1, rs2 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Div { rd, rs1, rs2 })
            }
            Instr::Slt { rd, rs1, rs2 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Slt { rd, rs1, rs2 })
            }
            Instr::Addi { rd, rs1, imm } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                Ok(Instr::Addi { rd, rs1, imm: *imm })
            }
            Instr::Slti { rd, rs1, imm } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                Ok(Instr::Slti { rd, rs1, imm: *imm })
            }
            Instr::Xori { rd, rs1, imm } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                Ok(Instr::Xori { rd, rs1, imm: *imm })
            }
            Instr::Sw { base, offset, src } => {
                let base = self.resolve_src(base, out)?;
                let src = self.resolve_src(src, out)?;
                Ok(Instr::Sw {
                    base,
                    offset: *offset,
                    src,
                })
            }
            Instr::Lw { base, offset, rd } => {
                let rd = self.alloc_dest(rd, out);
                let base = self.resolve_src(base, out)?;
                Ok(Instr::Lw {
                    base,
                    offset: *offset,
                    rd,
                })
            }
            Instr::Beq { rs1, rs2, target } => {
                let rs1 = self.resolve_src(rs1, out)?;
                let rs2 = self.resolve_src(rs2, out)?;
                Ok(Instr::Beq {
                    rs1,
                    rs2,
                    target: *target,
                })
            }
            Instr::Jal { rd, target } => {
                let rd = self.alloc_dest(rd, out);
                Ok(Instr::Jal {
                    rd,
                    target: *target,
                })
            }
            Instr::Jalr { rd, rs1 } => {
                let rd = self.alloc_dest(rd, out);
                let rs1 = self.resolve_src(rs1, out)?;
                Ok(Instr::Jalr { rd, rs1 })
            }
        }
    }

    // ── Destination allocation ──────────────────────────────────────────

    /// Resolve the destination operand to a physical register.
    ///
    /// Physical names pass through (after rescuing any symbolic resident an
    /// explicit bank write would clobber). A symbolic name reuses its
    /// current bank register, is reloaded if it was spilled (the name may
    /// also be a source of the same instruction), or claims a free slot.
    fn alloc_dest(&mut self, name: &str, out: &mut Vec<Instr>) -> String {
        if abi::is_physical(name) {
            if let Some(slot) = abi::bank_index(name) {
                if self.residents[slot].is_some() {
                    self.spill(slot, out);
                }
                self.pinned[slot] = true;
            }
            return name.to_string();
        }

        let slot = match self.locations.get(name) {
            Some(Loc::Reg(slot)) => *slot,
            Some(Loc::Mem(addr)) => {
                let addr = *addr;
                let slot = self.claim_slot(out);
                out.push(Instr::Lw {
                    base: abi::ZERO.to_string(),
                    offset: addr,
                    rd: abi::BANK[slot].to_string(),
                });
                self.bind(name, slot);
                slot
            }
            None => {
                let slot = self.claim_slot(out);
                self.bind(name, slot);
                slot
            }
        };
        self.pinned[slot] = true;
        abi::BANK[slot].to_string()
    }

    // ── Source resolution ───────────────────────────────────────────────

    /// Resolve a source operand to a physical register, reloading it from
    /// its spill slot if needed.
    fn resolve_src(&mut self, name: &str, out: &mut Vec<Instr>) -> Result<String, AllocError> {
        if abi::is_physical(name) {
            if let Some(slot) = abi::bank_index(name) {
                self.pinned[slot] = true;
            }
            return Ok(name.to_string());
        }

        let slot = match self.locations.get(name) {
            Some(Loc::Reg(slot)) => *slot,
            Some(Loc::Mem(addr)) => {
                let addr = *addr;
                let slot = self.claim_slot(out);
                out.push(Instr::Lw {
                    base: abi::ZERO.to_string(),
                    offset: addr,
                    rd: abi::BANK[slot].to_string(),
                });
                self.bind(name, slot);
                slot
            }
            None => {
                return Err(AllocError::UnknownRegister {
                    name: name.to_string(),
                })
            }
        };
        self.pinned[slot] = true;
        Ok(abi::BANK[slot].to_string())
    }

    // ── Bank bookkeeping ────────────────────────────────────────────────

    /// A bank slot ready to receive a value: the first free one, or the
    /// round-robin victim's after spilling it.
    fn claim_slot(&mut self, out: &mut Vec<Instr>) -> usize {
        if let Some(free) = (0..BANK_SIZE).find(|&s| self.residents[s].is_none()) {
            return free;
        }
        let victim = self.next_victim();
        self.spill(victim, out);
        victim
    }

    /// Strict round-robin, skipping slots pinned by the current instruction.
    /// At most three slots are ever pinned at once, so this terminates.
    fn next_victim(&mut self) -> usize {
        loop {
            let slot = self.victim % BANK_SIZE;
            self.victim += 1;
            if !self.pinned[slot] {
                return slot;
            }
        }
    }

    /// Evict the resident of `slot` to a fresh spill address.
    fn spill(&mut self, slot: usize, out: &mut Vec<Instr>) {
        let name = self.residents[slot]
            .take()
            .expect("spill of an empty bank slot");
        let addr = self.next_slot;
        self.next_slot += 1;
        self.locations.insert(name, Loc::Mem(addr));
        out.push(Instr::Sw {
            base: abi::ZERO.to_string(),
            offset: addr,
            src: abi::BANK[slot].to_string(),
        });
    }

    /// Make `name` resident in `slot`.
    fn bind(&mut self, name: &str, slot: usize) {
        if let Some(old) = self.residents[slot].replace(name.to_string()) {
            // The caller spilled or consumed the old resident already.
            debug_assert!(
                !matches!(self.locations.get(&old), Some(Loc::Reg(s)) if *s == slot),
                "resident '{old}' overwritten while still located in slot {slot}"
            );
        }
        self.locations.insert(name.to_string(), Loc::Reg(slot));
    }
}
