//! `Instruction`, `Function` and `Module` (spec.md §3). Generalizes the
//! teacher's fixed R/I/J instruction formats (`enums.rs` comment block)
//! into one flat tuple wide enough to carry every opcode's operands,
//! the way spec.md §3 specifies it: `{op, dest, src1, src2, imm, label,
//! symbol, type, comment}`.

use std::collections::HashMap;

use minz_support::SourceLoc;

use crate::opcode::Opcode;
use crate::types::TypeId;
use crate::vreg::Vreg;

/// One three-address IR instruction. Unused operand slots take their
/// type's "empty" value (`Vreg::UNUSED`, `0`, `""`) rather than
/// `Option`, mirroring the teacher's fixed-width instruction encoding
/// where every field is always present but may carry a don't-care value.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: Opcode,
    pub dest: Vreg,
    pub src1: Vreg,
    pub src2: Vreg,
    pub imm: i64,
    pub label: String,
    pub symbol: String,
    pub ty: TypeId,
    pub comment: String,
    pub loc: SourceLoc,
}

impl Instruction {
    pub fn new(op: Opcode, ty: TypeId) -> Self {
        Instruction {
            op,
            dest: Vreg::UNUSED,
            src1: Vreg::UNUSED,
            src2: Vreg::UNUSED,
            imm: 0,
            label: String::new(),
            symbol: String::new(),
            ty,
            comment: String::new(),
            loc: SourceLoc::UNKNOWN,
        }
    }

    pub fn with_dest(mut self, dest: Vreg) -> Self {
        self.dest = dest;
        self
    }

    pub fn with_src1(mut self, src1: Vreg) -> Self {
        self.src1 = src1;
        self
    }

    pub fn with_src2(mut self, src2: Vreg) -> Self {
        self.src2 = src2;
        self
    }

    pub fn with_imm(mut self, imm: i64) -> Self {
        self.imm = imm;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_loc(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    /// Every vreg this instruction reads, for the DCE/liveness walks
    /// (spec.md §4.2 pass 2, §4.3). Excludes `dest`.
    pub fn reads(&self) -> impl Iterator<Item = Vreg> {
        [self.src1, self.src2]
            .into_iter()
            .filter(|v| !v.is_unused())
    }

    pub fn writes(&self) -> Option<Vreg> {
        if self.dest.is_unused() {
            None
        } else {
            Some(self.dest)
        }
    }
}

/// Per-function parameter metadata: name, type, and (if SMC is active
/// for this function) the byte offset of its patchable immediate slot
/// from the function's entry point (spec.md §3's `smc_param_offsets`).
#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Clone, Debug, Default)]
pub struct Attributes {
    pub smc: bool,
    pub abi_stack: bool,
    pub target: Option<String>,
    pub export: bool,
    pub rom: bool,
    pub interrupt: bool,
    pub addr_taken: bool,
}

/// `Function` (spec.md §3). `instructions` is a single linear stream —
/// there are no basic-block objects; block boundaries are implicit at
/// `Label`/jump instructions, matching spec.md §2's "basic-blockless
/// linear instruction streams".
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeId,
    pub error_type: Option<TypeId>,
    pub instructions: Vec<Instruction>,
    pub num_params: u32,
    pub is_smc_default: bool,
    pub requires_context: bool,
    pub smc_param_offsets: HashMap<String, u32>,
    pub attributes: Attributes,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: TypeId) -> Self {
        Function {
            name: name.into(),
            params: Vec::new(),
            return_type,
            error_type: None,
            instructions: Vec::new(),
            num_params: 0,
            is_smc_default: true,
            requires_context: false,
            smc_param_offsets: HashMap::new(),
            attributes: Attributes::default(),
        }
    }

    /// Labels defined by exactly one `Label` instruction, per spec.md
    /// §3's invariant. Returns duplicates so callers can turn them into
    /// an `InternalError`.
    pub fn label_positions(&self) -> HashMap<&str, usize> {
        let mut map = HashMap::new();
        for (i, instr) in self.instructions.iter().enumerate() {
            if instr.op == Opcode::Label {
                map.insert(instr.label.as_str(), i);
            }
        }
        map
    }
}

#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    pub ty: TypeId,
    pub init: Vec<u8>,
}

/// `Module{functions, globals, strings}` (spec.md §3). Owns the type
/// table that every `TypeId` in the module indexes into, since the
/// teacher's opcode/register enums need no such table but MinZ's
/// recursive type sum does (spec.md §9 "arena-indexed ids").
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub strings: Vec<String>,
    pub types: Vec<crate::types::Type>,
}

impl Module {
    /// `TypeId(0)` is always `Type::Void`, reserved as the placeholder
    /// type for control-flow instructions (`Jump`, `Label`, ...) that
    /// carry no value of their own, so any instruction's `ty` field is
    /// safe to index without a prior, call-site-specific intern.
    pub fn new() -> Self {
        let mut module = Module::default();
        module.types.push(crate::types::Type::Void);
        module
    }

    pub fn intern_type(&mut self, ty: crate::types::Type) -> TypeId {
        if let Some(pos) = self.types.iter().position(|t| *t == ty) {
            return TypeId(pos as u32);
        }
        self.types.push(ty);
        TypeId((self.types.len() - 1) as u32)
    }

    pub fn type_of(&self, id: TypeId) -> &crate::types::Type {
        &self.types[id.0 as usize]
    }

    pub fn intern_string(&mut self, s: impl Into<String>) -> u32 {
        let s = s.into();
        if let Some(pos) = self.strings.iter().position(|existing| existing == &s) {
            return pos as u32;
        }
        self.strings.push(s);
        (self.strings.len() - 1) as u32
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Byte size of an aggregate type, recursing through the type table
    /// (spec.md §3: "bit-struct field offsets are derived by prefix sum
    /// of widths"; struct/array sizes are the analogous sum/product).
    pub fn type_size(&self, id: TypeId) -> u32 {
        use crate::types::Type;
        match self.type_of(id) {
            Type::Array { element, size } => self.type_size(*element) * size,
            Type::Struct { fields, .. } => fields.iter().map(|f| self.type_size(f.ty)).sum(),
            Type::Alias { target, .. } => self.type_size(*target),
            other => other.leaf_size_bytes().unwrap_or(0),
        }
    }
}
