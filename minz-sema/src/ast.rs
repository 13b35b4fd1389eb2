//! The AST input contract (spec.md §6.1). The concrete grammar is an
//! external collaborator (spec.md §1); this module only fixes the
//! shape `analyze` accepts, the way the teacher's `vasm` crate fixes a
//! `Rule` shape for its pest grammar without owning CPU semantics.
//! Source positions are carried opaquely on every node and never
//! interpreted here beyond being copied onto diagnostics.

use minz_support::SourceLoc;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Pointer { base: Box<TypeExpr>, mutable: bool },
    Array { element: Box<TypeExpr>, size: Box<Expr> },
    BitsOf { underlying_bits: u32, fields: Vec<(String, u32)> },
    Fallible { value: Box<TypeExpr>, error_enum: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal { value: Literal, loc: SourceLoc },
    Ident { name: String, loc: SourceLoc },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>, loc: SourceLoc },
    Unary { op: UnOp, operand: Box<Expr>, loc: SourceLoc },
    Call { callee: String, args: Vec<Expr>, loc: SourceLoc },
    Field { base: Box<Expr>, field: String, loc: SourceLoc },
    Index { base: Box<Expr>, index: Box<Expr>, loc: SourceLoc },
    Cast { value: Box<Expr>, target: TypeExpr, loc: SourceLoc },
    Try { value: Box<Expr>, loc: SourceLoc },
    StructLiteral { type_name: String, fields: Vec<(String, Expr)>, loc: SourceLoc },
    ArrayLiteral { elements: Vec<Expr>, loc: SourceLoc },
    MethodCall { receiver: Box<Expr>, method: String, args: Vec<Expr>, loc: SourceLoc },
}

impl Expr {
    pub fn loc(&self) -> SourceLoc {
        match self {
            Expr::Literal { loc, .. }
            | Expr::Ident { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Field { loc, .. }
            | Expr::Index { loc, .. }
            | Expr::Cast { loc, .. }
            | Expr::Try { loc, .. }
            | Expr::StructLiteral { loc, .. }
            | Expr::ArrayLiteral { loc, .. }
            | Expr::MethodCall { loc, .. } => *loc,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let { name: String, ty: Option<TypeExpr>, mutable: bool, init: Expr, loc: SourceLoc },
    Assign { target: Expr, value: Expr, loc: SourceLoc },
    Expr { value: Expr, loc: SourceLoc },
    Return { value: Option<Expr>, loc: SourceLoc },
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>, loc: SourceLoc },
    While { cond: Expr, body: Vec<Stmt>, loc: SourceLoc },
    For { binding: String, iterable: Expr, body: Vec<Stmt>, loc: SourceLoc },
    Loop { body: Vec<Stmt>, loc: SourceLoc },
    Case { discriminant: Expr, arms: Vec<(Expr, Vec<Stmt>)>, default: Vec<Stmt>, loc: SourceLoc },
    Break { loc: SourceLoc },
    Continue { loc: SourceLoc },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Vec<Stmt>,
    pub attributes: Vec<Attribute>,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<Param>,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub variants: Vec<String>,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub init: Expr,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAliasDecl {
    pub name: String,
    pub target: TypeExpr,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<FunctionDecl>,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImplDecl {
    pub interface_name: String,
    pub type_name: String,
    pub methods: Vec<FunctionDecl>,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetaBlock {
    pub code: String,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Const(ConstDecl),
    Var(VarDecl),
    TypeAlias(TypeAliasDecl),
    Interface(InterfaceDecl),
    Impl(ImplDecl),
    Meta(MetaBlock),
    Attributed { attributes: Vec<Attribute>, inner: Box<Decl> },
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Import {
    pub path: String,
    pub alias: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct File {
    pub module_name: Option<String>,
    pub imports: Vec<Import>,
    pub declarations: Vec<Decl>,
}
