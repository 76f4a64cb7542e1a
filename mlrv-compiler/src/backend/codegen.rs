//! AST → machine-code lowering.
//!
//! The generator walks the expression bottom-up, appending instructions to a
//! [`Program`] and handing back the symbolic register that holds each node's
//! result. Control flow is linearised with unbound labels that are bound once
//! the join point is reached; targets stay symbolic until after register
//! allocation.

use super::abi;
use super::machine::{Instr, Program, Target};
use crate::ast::Exp;
use std::collections::HashMap;

/// Expression code generator.
///
/// Owns the fresh-name counter and the `let`-binding scope map. One
/// `CodeGen` compiles one program; names are unique within it.
#[derive(Debug, Default)]
pub struct CodeGen {
    next_name: u32,
    /// Source name → stack of live binding registers, innermost last.
    scopes: HashMap<String, Vec<String>>,
}

impl CodeGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next fresh temporary: `v1, v2, …`.
    fn fresh(&mut self) -> String {
        self.next_name += 1;
        format!("v{}", self.next_name)
    }

    /// Fresh register for a `let` binding occurrence. Sharing the counter
    /// with temporaries keeps every generated name unique; the dot keeps the
    /// name out of the source identifier namespace.
    fn fresh_binding(&mut self, name: &str) -> String {
        self.next_name += 1;
        format!("{name}.{}", self.next_name)
    }

    /// The register a variable reference denotes: the innermost live
    /// binding, or the bare name itself for unbound identifiers (which lets
    /// hand-built expressions read machine registers such as `sp`; the type
    /// checker rejects unbound variables in the normal pipeline).
    fn lookup(&self, name: &str) -> String {
        match self.scopes.get(name).and_then(|stack| stack.last()) {
            Some(reg) => reg.clone(),
            None => name.to_string(),
        }
    }

    /// Lower `exp`, appending its instructions to `prog`. Returns the
    /// register holding the result.
    pub fn lower(&mut self, exp: &Exp, prog: &mut Program) -> String {
        match exp {
            Exp::Num(n) => {
                let rd = self.fresh();
                prog.push(Instr::li(&rd, *n));
                rd
            }
            // true is 1; false is x0 itself — no instruction needed.
            Exp::Bln(true) => {
                let rd = self.fresh();
                prog.push(Instr::li(&rd, 1));
                rd
            }
            Exp::Bln(false) => abi::ZERO.to_string(),

            Exp::Var(name) => self.lookup(name),

            Exp::Add(l, r) => self.binary(l, r, prog, |rd, rs1, rs2| Instr::Add { rd, rs1, rs2 }),
            Exp::Sub(l, r) => self.binary(l, r, prog, |rd, rs1, rs2| Instr::Sub { rd, rs1, rs2 }),
            Exp::Mul(l, r) => self.binary(l, r, prog, |rd, rs1, rs2| Instr::Mul { rd, rs1, rs2 }),
            Exp::Div(l, r) => self.binary(l, r, prog, |rd, rs1, rs2| Instr::Div { rd, rs1, rs2 }),
            Exp::Lth(l, r) => self.binary(l, r, prog, |rd, rs1, rs2| Instr::Slt { rd, rs1, rs2 }),

            // l <= r  ⇔  not (r < l)
            Exp::Leq(l, r) => {
                let rs1 = self.lower(l, prog);
                let rs2 = self.lower(r, prog);
                let lt = self.fresh();
                prog.push(Instr::Slt {
                    rd: lt.clone(),
                    rs1: rs2,
                    rs2: rs1,
                });
                let rd = self.fresh();
                prog.push(Instr::Xori {
                    rd: rd.clone(),
                    rs1: lt,
                    imm: 1,
                });
                rd
            }

            // l = r  ⇔  not (l < r or r < l); there is no native equality
            // opcode, so it is synthesised from two slt's.
            Exp::Eql(l, r) => {
                let rs1 = self.lower(l, prog);
                let rs2 = self.lower(r, prog);
                let lt = self.fresh();
                prog.push(Instr::Slt {
                    rd: lt.clone(),
                    rs1: rs1.clone(),
                    rs2: rs2.clone(),
                });
                let gt = self.fresh();
                prog.push(Instr::Slt {
                    rd: gt.clone(),
                    rs1: rs2,
                    rs2: rs1,
                });
                let either = self.fresh();
                prog.push(Instr::Add {
                    rd: either.clone(),
                    rs1: lt,
                    rs2: gt,
                });
                let rd = self.fresh();
                prog.push(Instr::Xori {
                    rd: rd.clone(),
                    rs1: either,
                    imm: 1,
                });
                rd
            }

            Exp::Neg(e) => {
                let rs = self.lower(e, prog);
                let rd = self.fresh();
                prog.push(Instr::Sub {
                    rd: rd.clone(),
                    rs1: abi::ZERO.to_string(),
                    rs2: rs,
                });
                rd
            }

            Exp::Not(e) => {
                let rs = self.lower(e, prog);
                let rd = self.fresh();
                prog.push(Instr::Xori {
                    rd: rd.clone(),
                    rs1: rs,
                    imm: 1,
                });
                rd
            }

            // Short-circuit: if the left operand is false the right
            // operand's instructions never execute.
            Exp::And(l, r) => {
                let false_case = prog.new_label();
                let done = prog.new_label();

                let left = self.lower(l, prog);
                prog.push(Instr::Beq {
                    rs1: left,
                    rs2: abi::ZERO.to_string(),
                    target: Target::Label(false_case),
                });
                let right = self.lower(r, prog);
                prog.push(Instr::Beq {
                    rs1: right,
                    rs2: abi::ZERO.to_string(),
                    target: Target::Label(false_case),
                });

                let rd = self.fresh();
                prog.push(Instr::li(&rd, 1));
                prog.push(Instr::jump(Target::Label(done)));
                prog.bind_label(false_case);
                prog.push(Instr::li(&rd, 0));
                prog.bind_label(done);
                rd
            }

            // Symmetric to And, branching on equality with the constant 1.
            Exp::Or(l, r) => {
                let true_case = prog.new_label();
                let done = prog.new_label();

                let left = self.lower(l, prog);
                let one = self.fresh();
                prog.push(Instr::li(&one, 1));
                prog.push(Instr::Beq {
                    rs1: left,
                    rs2: one.clone(),
                    target: Target::Label(true_case),
                });
                let right = self.lower(r, prog);
                prog.push(Instr::Beq {
                    rs1: right,
                    rs2: one,
                    target: Target::Label(true_case),
                });

                let rd = self.fresh();
                prog.push(Instr::li(&rd, 0));
                prog.push(Instr::jump(Target::Label(done)));
                prog.bind_label(true_case);
                prog.push(Instr::li(&rd, 1));
                prog.bind_label(done);
                rd
            }

            // Both arms copy into one shared result register, so code after
            // the conditional reads a single name whichever arm ran.
            Exp::IfThenElse(cond, e0, e1) => {
                let else_case = prog.new_label();
                let done = prog.new_label();

                let c = self.lower(cond, prog);
                prog.push(Instr::Beq {
                    rs1: c,
                    rs2: abi::ZERO.to_string(),
                    target: Target::Label(else_case),
                });

                let then_reg = self.lower(e0, prog);
                let rd = self.fresh();
                prog.push(Instr::mov(&rd, then_reg));
                prog.push(Instr::jump(Target::Label(done)));

                prog.bind_label(else_case);
                let else_reg = self.lower(e1, prog);
                prog.push(Instr::mov(&rd, else_reg));
                prog.bind_label(done);
                rd
            }

            // Each binding occurrence gets its own register, so shadowed
            // names never alias.
            Exp::Let(name, def, body) => {
                let def_reg = self.lower(def, prog);
                let bound = self.fresh_binding(name);
                prog.push(Instr::mov(&bound, def_reg));

                self.scopes.entry(name.clone()).or_default().push(bound);
                let result = self.lower(body, prog);
                self.scopes
                    .get_mut(name)
                    .expect("scope stack pushed above")
                    .pop();
                result
            }
        }
    }

    fn binary(
        &mut self,
        l: &Exp,
        r: &Exp,
        prog: &mut Program,
        make: impl FnOnce(String, String, String) -> Instr,
    ) -> String {
        // Left before right: evaluation order is a language guarantee.
        let rs1 = self.lower(l, prog);
        let rs2 = self.lower(r, prog);
        let rd = self.fresh();
        prog.push(make(rd.clone(), rs1, rs2));
        rd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::machine::{execute, Target};

    fn lower(exp: &Exp) -> (Program, String) {
        let mut prog = Program::new();
        let result = CodeGen::new().lower(exp, &mut prog);
        (prog, result)
    }

    #[test]
    fn num_is_one_addi_off_x0() {
        let (prog, result) = lower(&Exp::Num(123));
        assert_eq!(prog.insts(), &[Instr::li("v1", 123)]);
        assert_eq!(result, "v1");
    }

    #[test]
    fn false_lowers_to_x0_with_no_code() {
        let (prog, result) = lower(&Exp::Bln(false));
        assert!(prog.is_empty());
        assert_eq!(result, "x0");
    }

    #[test]
    fn operands_are_lowered_left_to_right() {
        let (prog, result) = lower(&Exp::Sub(Box::new(Exp::Num(30)), Box::new(Exp::Num(4))));
        assert_eq!(
            prog.insts(),
            &[
                Instr::li("v1", 30),
                Instr::li("v2", 4),
                Instr::Sub {
                    rd: "v3".into(),
                    rs1: "v1".into(),
                    rs2: "v2".into(),
                },
            ]
        );
        assert_eq!(result, "v3");
    }

    #[test]
    fn equality_is_synthesised_from_two_slts() {
        let (prog, _) = lower(&Exp::Eql(Box::new(Exp::Num(4)), Box::new(Exp::Num(4))));
        let ops: Vec<&Instr> = prog.insts().iter().collect();
        assert!(matches!(ops[2], Instr::Slt { .. }));
        assert!(matches!(ops[3], Instr::Slt { .. }));
        assert!(matches!(ops[4], Instr::Add { .. }));
        assert!(matches!(ops[5], Instr::Xori { imm: 1, .. }));
    }

    #[test]
    fn and_branches_twice_to_one_false_case() {
        let (mut prog, result) = lower(&Exp::And(
            Box::new(Exp::Bln(true)),
            Box::new(Exp::Bln(true)),
        ));
        prog.resolve_targets().unwrap();

        let branch_targets: Vec<usize> = prog
            .insts()
            .iter()
            .filter_map(|i| match i {
                Instr::Beq { rs2, target: Target::Index(t), .. } if rs2 == "x0" => Some(*t),
                _ => None,
            })
            .collect();
        // Two conditional branches and the final jump all in play; the two
        // operand branches share the false-case index.
        assert_eq!(branch_targets[0], branch_targets[1]);

        let m = execute(&prog, 100).unwrap();
        assert_eq!(m.get_val(&result), Some(1));
    }

    #[test]
    fn shadowed_let_bindings_get_distinct_registers() {
        // let v <- 1 in (let v <- 2 in v end) + v end
        let exp = Exp::let_in(
            "v",
            Exp::Num(1),
            Exp::Add(
                Box::new(Exp::let_in("v", Exp::Num(2), Exp::var("v"))),
                Box::new(Exp::var("v")),
            ),
        );
        let (prog, result) = lower(&exp);
        let m = execute(&prog, 100).unwrap();
        assert_eq!(m.get_val(&result), Some(3));
    }

    #[test]
    fn free_variable_reads_the_raw_register() {
        let (prog, result) = lower(&Exp::var("sp"));
        assert!(prog.is_empty());
        assert_eq!(result, "sp");
    }
}
