//! Lowering (spec.md §4.1): each AST statement/expression maps to a
//! small, deterministic IR fragment. Short-circuit `&&`/`||` lower to
//! conditional jumps; `case` lowers to chained equality tests; `expr?`
//! lowers to a call followed by a conditional jump to the function's
//! error-return trampoline.
//!
//! Mirrors the teacher's `vasm` pattern of building a flat instruction
//! vector plus a side label map (`labels.rs`) rather than a tree of
//! basic-block objects, since spec.md §2 specifies "basic-blockless
//! linear instruction streams".

use std::collections::HashMap;

use minz_ir::{Diagnostic, Diagnostics, Function, Instruction, Module, Opcode, Type, TypeId, Vreg, VregAllocator};
use minz_support::SourceLoc;

use crate::ast::{BinOp, Expr, Literal, Stmt, TypeExpr, UnOp};
use crate::symtab::{ScopeId, SymbolKind, SymbolTable};

/// Per-function lowering state. One instance is created per function
/// body; `module` and `symtab` are threaded through by mutable
/// reference since types and (for forward references) other
/// functions' signatures may need to be interned mid-lowering.
pub struct FunctionLowering<'a> {
    pub module: &'a mut Module,
    pub symtab: &'a mut SymbolTable,
    pub diags: &'a mut Diagnostics,
    pub function_return_types: &'a HashMap<String, (TypeId, Option<TypeId>)>,
    pub function_params: &'a HashMap<String, Vec<minz_ir::Param>>,
    pub method_tables: &'a crate::dispatch::MethodTables,
    vregs: VregAllocator,
    instructions: Vec<Instruction>,
    label_counter: u32,
    scope: ScopeId,
    loop_labels: Vec<(String, String)>, // (continue_label, break_label)
    fallible_error_enum: Option<TypeId>,
    own_function_name: String,
    own_params: Vec<minz_ir::Param>,
    own_requires_context: bool,
}

impl<'a> FunctionLowering<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        module: &'a mut Module,
        symtab: &'a mut SymbolTable,
        diags: &'a mut Diagnostics,
        function_return_types: &'a HashMap<String, (TypeId, Option<TypeId>)>,
        function_params: &'a HashMap<String, Vec<minz_ir::Param>>,
        method_tables: &'a crate::dispatch::MethodTables,
        scope: ScopeId,
        num_params: u32,
        fallible_error_enum: Option<TypeId>,
        own_function_name: String,
        own_params: Vec<minz_ir::Param>,
        own_requires_context: bool,
    ) -> Self {
        FunctionLowering {
            module,
            symtab,
            diags,
            function_return_types,
            function_params,
            method_tables,
            vregs: VregAllocator::starting_after_params(num_params),
            instructions: Vec::new(),
            label_counter: 0,
            scope,
            loop_labels: Vec::new(),
            fallible_error_enum,
            own_function_name,
            own_params,
            own_requires_context,
        }
    }

    /// `<fn>_param_<name>`, the SMC patch-site label a caller writes its
    /// argument into and a callee's prologue reads its parameter from
    /// (spec.md §4.4.1). Kept in sync with `minz_z80::smc::param_label`
    /// by convention; duplicated rather than shared since `minz-sema`
    /// stays backend-agnostic and must not depend on `minz-z80`.
    fn param_label(function_name: &str, param_name: &str) -> String {
        format!("{function_name}_param_{param_name}")
    }

    fn fresh_label(&mut self, hint: &str) -> String {
        self.label_counter += 1;
        format!(".L{}_{}", hint, self.label_counter)
    }

    fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn push_label(&mut self, label: String) {
        self.emit(Instruction::new(Opcode::Label, TypeId(0)).with_label(label));
    }

    pub fn finish(self) -> Vec<Instruction> {
        self.instructions
    }

    pub fn resolve_type(&mut self, type_expr: &TypeExpr) -> TypeId {
        match type_expr {
            TypeExpr::Named(name) => match name.as_str() {
                "u8" => self.module.intern_type(Type::U8),
                "u16" => self.module.intern_type(Type::U16),
                "u24" => self.module.intern_type(Type::U24),
                "i8" => self.module.intern_type(Type::I8),
                "i16" => self.module.intern_type(Type::I16),
                "i24" => self.module.intern_type(Type::I24),
                "bool" => self.module.intern_type(Type::Bool),
                "void" => self.module.intern_type(Type::Void),
                other => {
                    // A declared struct/enum/alias name not found in the
                    // prepass type table; this compiler reports it and
                    // falls back to `void` so lowering can continue
                    // (spec.md §4.1's "continue past local failures").
                    self.diags.push(Diagnostic::Name {
                        loc: SourceLoc::UNKNOWN,
                        message: format!("undeclared type `{}`", other),
                    });
                    self.module.intern_type(Type::Void)
                }
            },
            TypeExpr::Pointer { base, mutable } => {
                let base_id = self.resolve_type(base);
                self.module.intern_type(Type::Pointer { base: base_id, mutable: *mutable })
            }
            TypeExpr::Array { element, size } => {
                let element_id = self.resolve_type(element);
                let size_val = match &**size {
                    Expr::Literal { value: Literal::Int(n), .. } => *n as u32,
                    _ => {
                        self.diags.push(Diagnostic::Layout {
                            loc: size.loc(),
                            message: "array size must be a constant expression".into(),
                        });
                        0
                    }
                };
                self.module.intern_type(Type::Array { element: element_id, size: size_val })
            }
            TypeExpr::BitsOf { underlying_bits, fields } => {
                let underlying = if *underlying_bits == 8 {
                    minz_ir::BitStructWidth::U8
                } else {
                    minz_ir::BitStructWidth::U16
                };
                let total_width: u32 = fields.iter().map(|(_, w)| w).sum();
                if total_width > underlying.bits() {
                    self.diags.push(Diagnostic::Layout {
                        loc: SourceLoc::UNKNOWN,
                        message: format!(
                            "bit-struct fields sum to {} bits, exceeds underlying width {}",
                            total_width,
                            underlying.bits()
                        ),
                    });
                }
                let bit_fields: Vec<minz_ir::types::BitField> = fields
                    .iter()
                    .map(|(name, width)| minz_ir::types::BitField {
                        name_id: self.module.intern_string(name.clone()),
                        width: *width,
                    })
                    .collect();
                self.module.intern_type(Type::BitStruct { underlying, fields: bit_fields.into() })
            }
            TypeExpr::Fallible { value, error_enum } => {
                let value_id = self.resolve_type(value);
                let error_id = self.resolve_type(&TypeExpr::Named(error_enum.clone()));
                self.module.intern_type(Type::ErrorWrapped { value_type: value_id, error_enum: error_id })
            }
        }
    }

    /// Lowers a statement list, returning nothing: statements only emit
    /// instructions for their side effects and control flow.
    pub fn lower_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, ty, mutable, init, loc } => {
                let (value, value_ty) = self.lower_expr(init, ty.as_ref());
                let declared_ty = ty.as_ref().map(|t| self.resolve_type(t)).unwrap_or(value_ty);
                if self
                    .symtab
                    .declare(self.scope, name.clone(), declared_ty, SymbolKind::LocalVar { mutable: *mutable })
                    .is_err()
                {
                    self.diags.push(Diagnostic::Name {
                        loc: *loc,
                        message: format!("duplicate definition of `{}`", name),
                    });
                }
                self.emit(
                    Instruction::new(Opcode::StoreVar, declared_ty)
                        .with_src1(value)
                        .with_symbol(name.clone())
                        .with_loc(*loc),
                );
            }
            Stmt::Assign { target, value, loc } => {
                let (value_vreg, value_ty) = self.lower_expr(value, None);
                self.lower_assign_target(target, value_vreg, value_ty, *loc);
            }
            Stmt::Expr { value, .. } => {
                self.lower_expr(value, None);
            }
            Stmt::Return { value, loc } => {
                match value {
                    Some(expr) => {
                        let (v, ty) = self.lower_expr(expr, None);
                        self.emit(Instruction::new(Opcode::Return, ty).with_src1(v).with_loc(*loc));
                    }
                    None => {
                        let void_ty = self.module.intern_type(Type::Void);
                        self.emit(Instruction::new(Opcode::Return, void_ty).with_loc(*loc));
                    }
                }
            }
            Stmt::If { cond, then_branch, else_branch, loc } => {
                let else_label = self.fresh_label("else");
                let end_label = self.fresh_label("endif");
                let (cond_v, _) = self.lower_expr(cond, None);
                self.emit(
                    Instruction::new(Opcode::JumpIfNot, TypeId(0))
                        .with_src1(cond_v)
                        .with_label(else_label.clone())
                        .with_loc(*loc),
                );
                self.lower_block(then_branch);
                self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(end_label.clone()));
                self.push_label(else_label);
                self.lower_block(else_branch);
                self.push_label(end_label);
            }
            Stmt::While { cond, body, loc } => {
                let top_label = self.fresh_label("loop");
                let end_label = self.fresh_label("endloop");
                self.loop_labels.push((top_label.clone(), end_label.clone()));
                self.push_label(top_label.clone());
                let (cond_v, _) = self.lower_expr(cond, None);
                self.emit(
                    Instruction::new(Opcode::JumpIfNot, TypeId(0))
                        .with_src1(cond_v)
                        .with_label(end_label.clone())
                        .with_loc(*loc),
                );
                self.lower_block(body);
                self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(top_label));
                self.push_label(end_label);
                self.loop_labels.pop();
            }
            Stmt::Loop { body, loc } => {
                let top_label = self.fresh_label("loop");
                let end_label = self.fresh_label("endloop");
                self.loop_labels.push((top_label.clone(), end_label.clone()));
                self.push_label(top_label.clone());
                self.lower_block(body);
                self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(top_label).with_loc(*loc));
                self.push_label(end_label);
                self.loop_labels.pop();
            }
            Stmt::For { binding, iterable, body, loc } => {
                // `for x in iterable` lowers to a counted while loop over
                // the iterable's bound, matching the plain counted-loop
                // idiom the DJNZ peephole pattern targets downstream
                // (spec.md §4.2 pass 4 / §4.4.6).
                let (bound_v, bound_ty) = self.lower_expr(iterable, None);
                let idx_ty = bound_ty;
                let zero = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::LoadConst, idx_ty).with_dest(zero).with_imm(0));
                self.emit(Instruction::new(Opcode::StoreVar, idx_ty).with_src1(zero).with_symbol(binding.clone()));
                let top_label = self.fresh_label("for");
                let end_label = self.fresh_label("endfor");
                self.loop_labels.push((top_label.clone(), end_label.clone()));
                self.push_label(top_label.clone());
                let cur = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::LoadVar, idx_ty).with_dest(cur).with_symbol(binding.clone()));
                let cmp = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::Lt, idx_ty).with_dest(cmp).with_src1(cur).with_src2(bound_v));
                self.emit(
                    Instruction::new(Opcode::JumpIfNot, TypeId(0))
                        .with_src1(cmp)
                        .with_label(end_label.clone())
                        .with_loc(*loc),
                );
                self.lower_block(body);
                let next = self.fresh_vreg();
                let one = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::LoadConst, idx_ty).with_dest(one).with_imm(1));
                self.emit(Instruction::new(Opcode::Add, idx_ty).with_dest(next).with_src1(cur).with_src2(one));
                self.emit(Instruction::new(Opcode::StoreVar, idx_ty).with_src1(next).with_symbol(binding.clone()));
                self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(top_label));
                self.push_label(end_label);
                self.loop_labels.pop();
            }
            Stmt::Case { discriminant, arms, default, loc } => {
                // Chained equality tests (spec.md §4.1); a dense-integer
                // jump-table variant is left to the optimizer's
                // instruction-selection pass rather than duplicated here.
                let (disc_v, disc_ty) = self.lower_expr(discriminant, None);
                let end_label = self.fresh_label("endcase");
                let mut next_arm_label = self.fresh_label("case");
                for (pattern, arm_body) in arms {
                    self.push_label(next_arm_label.clone());
                    let (pattern_v, _) = self.lower_expr(pattern, Some(disc_ty));
                    let matches = self.fresh_vreg();
                    self.emit(
                        Instruction::new(Opcode::Eq, disc_ty)
                            .with_dest(matches)
                            .with_src1(disc_v)
                            .with_src2(pattern_v),
                    );
                    let skip_label = self.fresh_label("case_skip");
                    self.emit(
                        Instruction::new(Opcode::JumpIfNot, TypeId(0))
                            .with_src1(matches)
                            .with_label(skip_label.clone())
                            .with_loc(*loc),
                    );
                    self.lower_block(arm_body);
                    self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(end_label.clone()));
                    next_arm_label = skip_label;
                }
                self.push_label(next_arm_label);
                self.lower_block(default);
                self.push_label(end_label);
            }
            Stmt::Break { loc } => match self.loop_labels.last() {
                Some((_, end)) => {
                    self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(end.clone()).with_loc(*loc));
                }
                None => self.diags.push(Diagnostic::ControlFlow {
                    loc: *loc,
                    message: "`break` outside of a loop".into(),
                }),
            },
            Stmt::Continue { loc } => match self.loop_labels.last() {
                Some((top, _)) => {
                    self.emit(Instruction::new(Opcode::Jump, TypeId(0)).with_label(top.clone()).with_loc(*loc));
                }
                None => self.diags.push(Diagnostic::ControlFlow {
                    loc: *loc,
                    message: "`continue` outside of a loop".into(),
                }),
            },
        }
    }

    fn lower_assign_target(&mut self, target: &Expr, value: Vreg, value_ty: TypeId, loc: SourceLoc) {
        match target {
            Expr::Ident { name, .. } => {
                match self.symtab.resolve(self.scope, name) {
                    Some(sym) if matches!(self.symtab.symbol(sym).kind, SymbolKind::LocalVar { mutable: false }) => {
                        self.diags.push(Diagnostic::Type {
                            loc,
                            message: format!("cannot assign to immutable binding `{}`", name),
                        });
                    }
                    None => self.diags.push(Diagnostic::Name {
                        loc,
                        message: format!("undeclared identifier `{}`", name),
                    }),
                    _ => {}
                }
                self.emit(
                    Instruction::new(Opcode::StoreVar, value_ty)
                        .with_src1(value)
                        .with_symbol(name.clone())
                        .with_loc(loc),
                );
            }
            Expr::Field { base, field, .. } => {
                if let Expr::Ident { name: base_name, .. } = &**base {
                    let base_ty = self.ident_type(base_name, loc);
                    if let Some((shift, mask)) = self.bit_field_shift_mask(base_ty, field) {
                        self.lower_bitfield_store(base_name, base_ty, shift, mask, value, loc);
                        return;
                    }
                }
                let (base_v, base_ty) = self.lower_expr(base, None);
                if self.bit_field_shift_mask(base_ty, field).is_some() {
                    self.diags.push(Diagnostic::Layout {
                        loc,
                        message: "bit-struct field assignment through a non-identifier base is not yet supported"
                            .into(),
                    });
                    return;
                }
                let offset = self.field_offset(base_ty, field);
                self.emit(
                    Instruction::new(Opcode::StoreField, value_ty)
                        .with_src1(base_v)
                        .with_src2(value)
                        .with_imm(offset)
                        .with_loc(loc),
                );
            }
            Expr::Index { base, index, .. } => {
                let (base_v, _) = self.lower_expr(base, None);
                let (index_v, _) = self.lower_expr(index, None);
                self.emit(
                    Instruction::new(Opcode::StoreIndex, value_ty)
                        .with_src1(base_v)
                        .with_src2(value)
                        .with_imm(0)
                        .with_symbol(format!("idx:{}", index_v))
                        .with_loc(loc),
                );
            }
            _ => self.diags.push(Diagnostic::Type {
                loc,
                message: "invalid assignment target".into(),
            }),
        }
    }

    fn field_offset(&self, struct_ty: TypeId, field: &str) -> i64 {
        if let Type::Struct { fields, .. } = self.module.type_of(struct_ty) {
            let mut offset = 0i64;
            for f in fields.iter() {
                let name = self.module.strings.get(f.name_id as usize).map(String::as_str).unwrap_or("");
                if name == field {
                    return offset;
                }
                offset += self.module.type_size(f.ty) as i64;
            }
        }
        0
    }

    /// An identifier's declared type, without emitting a `LoadVar` —
    /// used when a field-assignment target needs to classify its base
    /// (struct vs. bit-struct) before deciding what, if anything, to load.
    fn ident_type(&mut self, name: &str, loc: SourceLoc) -> TypeId {
        match self.symtab.resolve(self.scope, name) {
            Some(sym) => self.symtab.symbol(sym).ty,
            None => {
                self.diags.push(Diagnostic::Name {
                    loc,
                    message: format!("undeclared identifier `{}`", name),
                });
                self.module.intern_type(Type::Void)
            }
        }
    }

    /// The `(shift, mask)` pair for a named field of a bit-struct type
    /// (spec.md §6.3): the first-declared field occupies the low bits
    /// (shift 0), each later field's shift is the sum of every
    /// preceding field's width, and its mask is `(1 << width) - 1`.
    /// Returns `None` for any other type, so callers can fall through
    /// to the ordinary struct `field_offset`/`LoadField`/`StoreField`
    /// path unchanged.
    fn bit_field_shift_mask(&self, struct_ty: TypeId, field: &str) -> Option<(u32, i64)> {
        if let Type::BitStruct { fields, .. } = self.module.type_of(struct_ty) {
            let mut shift = 0u32;
            for f in fields.iter() {
                let name = self.module.strings.get(f.name_id as usize).map(String::as_str).unwrap_or("");
                if name == field {
                    return Some((shift, (1i64 << f.width) - 1));
                }
                shift += f.width;
            }
        }
        None
    }

    /// Packs `value` into the `[shift, shift+width)` bits of the named
    /// bit-struct variable, leaving every other bit untouched (spec.md
    /// §6.3): `base & !(mask << shift) | ((value & mask) << shift)`,
    /// using only opcodes this IR already has (`And`/`Or`/`Shl`).
    fn lower_bitfield_store(&mut self, base_name: &str, base_ty: TypeId, shift: u32, mask: i64, value: Vreg, loc: SourceLoc) {
        let base_v = self.fresh_vreg();
        self.emit(
            Instruction::new(Opcode::LoadVar, base_ty)
                .with_dest(base_v)
                .with_symbol(base_name.to_string())
                .with_loc(loc),
        );
        let cleared = self.fresh_vreg();
        self.emit(
            Instruction::new(Opcode::And, base_ty)
                .with_dest(cleared)
                .with_src1(base_v)
                .with_imm(!(mask << shift))
                .with_loc(loc),
        );
        let masked = self.fresh_vreg();
        self.emit(Instruction::new(Opcode::And, base_ty).with_dest(masked).with_src1(value).with_imm(mask).with_loc(loc));
        let shifted = if shift == 0 {
            masked
        } else {
            let out = self.fresh_vreg();
            self.emit(
                Instruction::new(Opcode::Shl, base_ty).with_dest(out).with_src1(masked).with_imm(shift as i64).with_loc(loc),
            );
            out
        };
        let result = self.fresh_vreg();
        self.emit(
            Instruction::new(Opcode::Or, base_ty).with_dest(result).with_src1(cleared).with_src2(shifted).with_loc(loc),
        );
        self.emit(
            Instruction::new(Opcode::StoreVar, base_ty)
                .with_src1(result)
                .with_symbol(base_name.to_string())
                .with_loc(loc),
        );
    }

    /// Extracts a bit-struct field's value out of an already-loaded base:
    /// `(base >> shift) & mask`.
    fn lower_bitfield_load(&mut self, base_v: Vreg, base_ty: TypeId, shift: u32, mask: i64, loc: SourceLoc) -> (Vreg, TypeId) {
        let shifted = if shift == 0 {
            base_v
        } else {
            let out = self.fresh_vreg();
            self.emit(
                Instruction::new(Opcode::Shr, base_ty).with_dest(out).with_src1(base_v).with_imm(shift as i64).with_loc(loc),
            );
            out
        };
        let dest = self.fresh_vreg();
        self.emit(Instruction::new(Opcode::And, base_ty).with_dest(dest).with_src1(shifted).with_imm(mask).with_loc(loc));
        (dest, base_ty)
    }

    fn fresh_vreg(&mut self) -> Vreg {
        self.vregs.fresh()
    }

    /// Lowers an expression to the vreg holding its value, returning the
    /// value's type for the caller's bidirectional checking. `expected`
    /// is a type hint per spec.md §4.1 (assignment/return/argument
    /// position); it currently only drives literal defaulting.
    pub fn lower_expr(&mut self, expr: &Expr, expected: Option<&TypeExpr>) -> (Vreg, TypeId) {
        match expr {
            Expr::Literal { value, loc } => self.lower_literal(value, expected, *loc),
            Expr::Ident { name, loc } => self.lower_ident(name, *loc),
            Expr::Binary { op, lhs, rhs, loc } => self.lower_binary(*op, lhs, rhs, *loc),
            Expr::Unary { op, operand, loc } => self.lower_unary(*op, operand, *loc),
            Expr::Call { callee, args, loc } => self.lower_call(callee, args, *loc),
            Expr::Field { base, field, loc } => {
                let (base_v, base_ty) = self.lower_expr(base, None);
                if let Some((shift, mask)) = self.bit_field_shift_mask(base_ty, field) {
                    return self.lower_bitfield_load(base_v, base_ty, shift, mask, *loc);
                }
                let offset = self.field_offset(base_ty, field);
                let field_ty = self.field_type(base_ty, field).unwrap_or(base_ty);
                let dest = self.fresh_vreg();
                self.emit(
                    Instruction::new(Opcode::LoadField, field_ty)
                        .with_dest(dest)
                        .with_src1(base_v)
                        .with_imm(offset)
                        .with_loc(*loc),
                );
                (dest, field_ty)
            }
            Expr::Index { base, index, loc } => {
                let (base_v, base_ty) = self.lower_expr(base, None);
                let (index_v, _) = self.lower_expr(index, None);
                let element_ty = if let Type::Array { element, .. } = self.module.type_of(base_ty) {
                    *element
                } else {
                    base_ty
                };
                let dest = self.fresh_vreg();
                self.emit(
                    Instruction::new(Opcode::LoadIndex, element_ty)
                        .with_dest(dest)
                        .with_src1(base_v)
                        .with_src2(index_v)
                        .with_loc(*loc),
                );
                (dest, element_ty)
            }
            Expr::Cast { value, target, loc } => {
                let (v, from_ty) = self.lower_expr(value, None);
                let to_ty = self.resolve_type(target);
                if !crate::typeck::is_valid_cast(self.module, from_ty, to_ty) {
                    self.diags.push(Diagnostic::Type {
                        loc: *loc,
                        message: format!(
                            "invalid cast from {} to {}",
                            self.module.type_of(from_ty),
                            self.module.type_of(to_ty)
                        ),
                    });
                }
                if crate::typeck::is_narrowing(self.module, from_ty, to_ty) {
                    let dest = self.fresh_vreg();
                    self.emit(
                        Instruction::new(Opcode::And, to_ty)
                            .with_dest(dest)
                            .with_src1(v)
                            .with_imm(self.module.type_of(to_ty).width().map(|w| w.mask()).unwrap_or(-1))
                            .with_comment("narrowing cast".into())
                            .with_loc(*loc),
                    );
                    (dest, to_ty)
                } else {
                    // Widening is a no-op at the IR level: the value
                    // already fits; the backend's register class for
                    // the wider type reads the same bits.
                    (v, to_ty)
                }
            }
            Expr::Try { value, loc } => self.lower_try(value, *loc),
            Expr::StructLiteral { type_name, fields, loc } => self.lower_struct_literal(type_name, fields, *loc),
            Expr::ArrayLiteral { elements, loc } => self.lower_array_literal(elements, *loc),
            Expr::MethodCall { receiver, method, args, loc } => {
                // Method dispatch (spec.md §4.1): resolve `(typeof(receiver),
                // method)` against the impl table built in the analyzer's
                // prepass (crate::dispatch::MethodTables), then lower
                // exactly like a plain call against the mangled
                // implementation name, with the receiver marshalled in as
                // the leading argument.
                let receiver_value = self.lower_expr(receiver, None);
                let candidates = self.method_tables.resolve_unqualified(receiver_value.1, method);
                let mangled = match candidates.as_slice() {
                    [] => {
                        self.diags.push(Diagnostic::Name {
                            loc: *loc,
                            message: format!("no interface implementation provides method `{}` for this type", method),
                        });
                        method.clone()
                    }
                    [one] => one.to_string(),
                    many => {
                        self.diags.push(Diagnostic::Name {
                            loc: *loc,
                            message: format!(
                                "call to `{}` is ambiguous across {} interface implementations",
                                method,
                                many.len()
                            ),
                        });
                        many[0].to_string()
                    }
                };
                self.lower_call_inner(&mangled, Some(receiver_value), args, *loc)
            }
        }
    }

    fn lower_literal(&mut self, lit: &Literal, expected: Option<&TypeExpr>, loc: SourceLoc) -> (Vreg, TypeId) {
        match lit {
            Literal::Int(n) => {
                let ty = expected.map(|t| self.resolve_type(t)).unwrap_or_else(|| self.module.intern_type(Type::U16));
                let dest = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::LoadConst, ty).with_dest(dest).with_imm(*n).with_loc(loc));
                (dest, ty)
            }
            Literal::Bool(b) => {
                let ty = self.module.intern_type(Type::Bool);
                let dest = self.fresh_vreg();
                self.emit(Instruction::new(Opcode::LoadConst, ty).with_dest(dest).with_imm(*b as i64).with_loc(loc));
                (dest, ty)
            }
            Literal::Str(s) => {
                let idx = self.module.intern_string(s.clone());
                let ty = self.module.intern_type(Type::Pointer { base: self.module_u8(), mutable: false });
                let dest = self.fresh_vreg();
                self.emit(
                    Instruction::new(Opcode::LoadConst, ty)
                        .with_dest(dest)
                        .with_imm(idx as i64)
                        .with_symbol(format!("str{}", idx))
                        .with_loc(loc),
                );
                (dest, ty)
            }
        }
    }

    fn module_u8(&mut self) -> TypeId {
        self.module.intern_type(Type::U8)
    }

    fn lower_ident(&mut self, name: &str, loc: SourceLoc) -> (Vreg, TypeId) {
        match self.symtab.resolve(self.scope, name) {
            Some(sym) => {
                let symbol = self.symtab.symbol(sym);
                let ty = symbol.ty;
                if let SymbolKind::Param { index } = symbol.kind {
                    return (Vreg(index + 1), ty);
                }
                let dest = self.fresh_vreg();
                self.emit(
                    Instruction::new(Opcode::LoadVar, ty)
                        .with_dest(dest)
                        .with_symbol(name.to_string())
                        .with_loc(loc),
                );
                (dest, ty)
            }
            None => {
                self.diags.push(Diagnostic::Name {
                    loc,
                    message: format!("undeclared identifier `{}`", name),
                });
                let ty = self.module.intern_type(Type::Void);
                (Vreg::UNUSED, ty)
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, loc: SourceLoc) -> (Vreg, TypeId) {
        if matches!(op, BinOp::LogicalAnd | BinOp::LogicalOr) {
            return self.lower_short_circuit(op, lhs, rhs, loc);
        }
        let (l, lty) = self.lower_expr(lhs, None);
        let (r, _rty) = self.lower_expr(rhs, None);
        let opcode = match op {
            BinOp::Add => Opcode::Add,
            BinOp::Sub => Opcode::Sub,
            BinOp::Mul => Opcode::Mul,
            BinOp::Div => Opcode::Div,
            BinOp::Mod => Opcode::Mod,
            BinOp::And => Opcode::And,
            BinOp::Or => Opcode::Or,
            BinOp::Xor => Opcode::Xor,
            BinOp::Shl => Opcode::Shl,
            BinOp::Shr => Opcode::Shr,
            BinOp::Eq => Opcode::Eq,
            BinOp::Ne => Opcode::Ne,
            BinOp::Lt => Opcode::Lt,
            BinOp::Gt => Opcode::Gt,
            BinOp::Le => Opcode::Le,
            BinOp::Ge => Opcode::Ge,
            BinOp::LogicalAnd | BinOp::LogicalOr => unreachable!(),
        };
        let result_ty = if matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge) {
            self.module.intern_type(Type::Bool)
        } else {
            lty
        };
        let dest = self.fresh_vreg();
        self.emit(
            Instruction::new(opcode, lty)
                .with_dest(dest)
                .with_src1(l)
                .with_src2(r)
                .with_loc(loc),
        );
        (dest, result_ty)
    }

    fn lower_short_circuit(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, loc: SourceLoc) -> (Vreg, TypeId) {
        let bool_ty = self.module.intern_type(Type::Bool);
        let (l, _) = self.lower_expr(lhs, None);
        let result = self.fresh_vreg();
        // `result = l` via an Or-with-zero copy idiom; cheaper forms
        // (plain register move) are the instruction-selection pass's job.
        self.emit(Instruction::new(Opcode::Or, bool_ty).with_dest(result).with_src1(l).with_src2(Vreg::ZERO));

        let short_circuit_label = self.fresh_label("sc");
        let rhs_needed = match op {
            BinOp::LogicalAnd => Opcode::JumpIfNot,
            BinOp::LogicalOr => Opcode::JumpIf,
            _ => unreachable!(),
        };
        self.emit(
            Instruction::new(rhs_needed, TypeId(0))
                .with_src1(l)
                .with_label(short_circuit_label.clone())
                .with_loc(loc),
        );
        let (r, _) = self.lower_expr(rhs, None);
        self.emit(Instruction::new(Opcode::Or, bool_ty).with_dest(result).with_src1(r).with_src2(Vreg::ZERO));
        self.push_label(short_circuit_label);
        (result, bool_ty)
    }

    fn lower_unary(&mut self, op: UnOp, operand: &Expr, loc: SourceLoc) -> (Vreg, TypeId) {
        let (v, ty) = self.lower_expr(operand, None);
        let opcode = match op {
            UnOp::Neg => Opcode::Neg,
            UnOp::Not => Opcode::Not,
            UnOp::BitNot => Opcode::Not,
        };
        let dest = self.fresh_vreg();
        self.emit(Instruction::new(opcode, ty).with_dest(dest).with_src1(v).with_loc(loc));
        (dest, ty)
    }

    /// Caller-side argument marshalling (spec.md §4.4.2): every argument
    /// is lowered, then written into the callee's named `<fn>_param_*`
    /// slot via `SMCParam` instead of being passed in a register or on
    /// the stack. When the enclosing function is itself part of a
    /// recursive cycle (`own_requires_context`), its own parameter slots
    /// are saved before marshalling and restored after the call
    /// (spec.md §4.4.3's save/update/call/restore protocol — "update"
    /// reuses the same `SMCParam` marshalling as a plain call).
    fn lower_call(&mut self, callee: &str, args: &[Expr], loc: SourceLoc) -> (Vreg, TypeId) {
        self.lower_call_inner(callee, None, args, loc)
    }

    /// Shared implementation behind `lower_call` and `Expr::MethodCall`:
    /// `leading`, when present, is an already-lowered value (the method
    /// receiver) marshalled into the callee's first parameter slot ahead
    /// of `args`.
    fn lower_call_inner(&mut self, callee: &str, leading: Option<(Vreg, TypeId)>, args: &[Expr], loc: SourceLoc) -> (Vreg, TypeId) {
        let (ret_ty, _err_ty) = self
            .function_return_types
            .get(callee)
            .copied()
            .unwrap_or_else(|| {
                self.diags.push(Diagnostic::Name {
                    loc,
                    message: format!("call to undeclared function `{}`", callee),
                });
                (self.module_void(), None)
            });

        if self.own_requires_context {
            for param in self.own_params.clone() {
                let label = Self::param_label(&self.own_function_name, &param.name);
                self.emit(Instruction::new(Opcode::SMCSave, param.ty).with_symbol(label).with_loc(loc));
            }
        }

        let callee_params = self.function_params.get(callee).cloned().unwrap_or_default();
        let mut marshal = |this: &mut Self, index: usize, v: Vreg, arg_ty: TypeId| {
            let (label, param_ty) = match callee_params.get(index) {
                Some(p) => (Self::param_label(callee, &p.name), p.ty),
                None => (format!("{callee}_param_{index}"), arg_ty),
            };
            this.emit(Instruction::new(Opcode::SMCParam, param_ty).with_src1(v).with_symbol(label).with_loc(loc));
        };

        let mut index = 0;
        if let Some((v, arg_ty)) = leading {
            marshal(self, index, v, arg_ty);
            index += 1;
        }
        for arg in args {
            let (v, arg_ty) = self.lower_expr(arg, None);
            marshal(self, index, v, arg_ty);
            index += 1;
        }

        let dest = self.fresh_vreg();
        self.emit(Instruction::new(Opcode::Call, ret_ty).with_dest(dest).with_symbol(callee.to_string()).with_loc(loc));

        if self.own_requires_context {
            for param in self.own_params.clone().into_iter().rev() {
                let label = Self::param_label(&self.own_function_name, &param.name);
                self.emit(Instruction::new(Opcode::SMCRestore, param.ty).with_symbol(label).with_loc(loc));
            }
        }

        (dest, ret_ty)
    }

    fn module_void(&mut self) -> TypeId {
        self.module.intern_type(Type::Void)
    }

    /// `expr?` (spec.md §4.1, §4.4.7's caller-facing half): call callee;
    /// on carry (error), jump to the function's error-return trampoline
    /// carrying the error code in the return register. The trampoline
    /// label is a well-known per-function name so the epilogue that
    /// emits it (built by the caller of this module, in the function's
    /// final lowering step) can find it.
    fn lower_try(&mut self, value: &Expr, loc: SourceLoc) -> (Vreg, TypeId) {
        let (call_result, ret_ty) = match &*value {
            Expr::Call { callee, args, .. } => {
                let (declared_ret, declared_err) = self
                    .function_return_types
                    .get(callee.as_str())
                    .copied()
                    .unwrap_or((self.module_void(), None));
                let (result_v, result_ty) = self.lower_call(callee, args, loc);
                if declared_err.is_none() {
                    // Implicit fallible function (Open Question #2,
                    // DESIGN.md): the callee declared no error enum of
                    // its own, so `?` here rewrites the call's effective
                    // result type to the synthesized generic error enum
                    // rather than leaving the declared (errorless) type
                    // in place — otherwise the carry check below would
                    // type-check against a type that can never compare
                    // unequal to zero.
                    let generic_error = self.fallible_error_enum.unwrap_or(declared_ret);
                    (result_v, generic_error)
                } else {
                    (result_v, result_ty)
                }
            }
            other => self.lower_expr(other, None),
        };
        let error_flag = self.fresh_vreg();
        self.emit(
            Instruction::new(Opcode::Ne, ret_ty)
                .with_dest(error_flag)
                .with_src1(Vreg::RET)
                .with_src2(Vreg::ZERO)
                .with_comment("carry check for `?`".into())
                .with_loc(loc),
        );
        self.emit(
            Instruction::new(Opcode::JumpIf, TypeId(0))
                .with_src1(error_flag)
                .with_label("__error_trampoline".to_string())
                .with_loc(loc),
        );
        (call_result, ret_ty)
    }

    fn lower_struct_literal(&mut self, type_name: &str, fields: &[(String, Expr)], loc: SourceLoc) -> (Vreg, TypeId) {
        let struct_ty = self.resolve_type(&TypeExpr::Named(type_name.to_string()));
        let base = self.fresh_vreg();
        let size = self.module.type_size(struct_ty);
        self.emit(
            Instruction::new(Opcode::Alloc, struct_ty)
                .with_dest(base)
                .with_imm(size as i64)
                .with_loc(loc),
        );
        for (field_name, field_expr) in fields {
            let (v, field_ty) = self.lower_expr(field_expr, None);
            let offset = self.field_offset(struct_ty, field_name);
            self.emit(
                Instruction::new(Opcode::StoreField, field_ty)
                    .with_src1(base)
                    .with_src2(v)
                    .with_imm(offset)
                    .with_loc(loc),
            );
        }
        (base, struct_ty)
    }

    fn lower_array_literal(&mut self, elements: &[Expr], loc: SourceLoc) -> (Vreg, TypeId) {
        let base = self.fresh_vreg();
        let mut element_ty = self.module.intern_type(Type::U8);
        self.emit(Instruction::new(Opcode::Alloc, element_ty).with_dest(base).with_loc(loc));
        for (i, element) in elements.iter().enumerate() {
            let (v, ty) = self.lower_expr(element, None);
            element_ty = ty;
            self.emit(
                Instruction::new(Opcode::StoreIndex, ty)
                    .with_src1(base)
                    .with_src2(v)
                    .with_imm(i as i64)
                    .with_loc(loc),
            );
        }
        let array_ty = self.module.intern_type(Type::Array { element: element_ty, size: elements.len() as u32 });
        (base, array_ty)
    }

    fn field_type(&self, struct_ty: TypeId, field: &str) -> Option<TypeId> {
        if let Type::Struct { fields, .. } = self.module.type_of(struct_ty) {
            for f in fields.iter() {
                let name = self.module.strings.get(f.name_id as usize).map(String::as_str).unwrap_or("");
                if name == field {
                    return Some(f.ty);
                }
            }
        }
        None
    }
}
