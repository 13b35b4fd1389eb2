//! Semantic analysis and lowering (spec.md §4.1): `analyze(ast_file) ->
//! Module | Errors`. Errors accumulate rather than abort, matching the
//! teacher's own preference for continuing past recoverable problems
//! where the domain allows it (`vasm`'s per-item `Result` short-circuits
//! instead, since an assembler line really can't be half-parsed — this
//! analyzer's accumulation policy is the spec's own choice, not copied
//! from the teacher).

pub mod ast;
pub mod dispatch;
pub mod lower;
pub mod recursion;
pub mod symtab;
pub mod typeck;

use std::collections::HashMap;

use minz_ir::{Diagnostics, Function, Global, Module, Param, Type, TypeId};
use tracing::{debug, info, warn};

use ast::{Decl, File};
use dispatch::MethodTables;
use recursion::CallGraph;
use symtab::{SymbolKind, SymbolTable};

pub struct AnalysisResult {
    pub module: Module,
    pub diagnostics: Diagnostics,
}

/// One function signature discovered in the prepass, ready to be
/// lowered. Plain top-level functions and `impl` methods (mangled to
/// `{interface}_{type}_{method}`, spec.md §4.1) are both reduced to
/// this shape so the lowering loop treats them identically.
struct PendingFunction<'f> {
    mangled_name: String,
    decl: &'f ast::FunctionDecl,
}

/// `analyze(ast_file) -> Module | Errors` (spec.md §4.1).
pub fn analyze(file: &File) -> AnalysisResult {
    let mut module = Module::new();
    let mut symtab = SymbolTable::new();
    let mut diags = Diagnostics::new();

    info!(functions = count_functions(file), "starting analysis");

    let root = symtab.module_scope();

    // Prepass, part 1: named types (spec.md §6.1's Struct/Enum/TypeAlias)
    // are interned before anything else, since a function signature or a
    // `let` may reference them ahead of their own top-level position.
    // Aliases and struct fields are resolved against whatever is already
    // interned, so a type may not forward-reference one declared later
    // in the same file — an accepted limitation, not a spec requirement.
    let mut type_names: HashMap<String, TypeId> = HashMap::new();
    for decl in flatten(&file.declarations) {
        if let Decl::Enum(e) = decl {
            let name_id = module.intern_string(e.name.clone());
            let variants = e.variants.iter().map(|v| module.intern_string(v.clone())).collect();
            let ty = module.intern_type(Type::Enum { name_id, variants: std::rc::Rc::from(variants) });
            type_names.insert(e.name.clone(), ty);
        }
    }
    for decl in flatten(&file.declarations) {
        if let Decl::Struct(s) = decl {
            let name_id = module.intern_string(s.name.clone());
            let fields: Vec<minz_ir::types::Field> = s
                .fields
                .iter()
                .map(|p| minz_ir::Field {
                    name_id: module.intern_string(p.name.clone()),
                    ty: resolve_named_type(&mut module, &p.ty, &type_names, &mut diags),
                })
                .collect();
            let ty = module.intern_type(Type::Struct { name_id, fields: std::rc::Rc::from(fields) });
            type_names.insert(s.name.clone(), ty);
        }
    }
    for decl in flatten(&file.declarations) {
        if let Decl::TypeAlias(a) = decl {
            let name_id = module.intern_string(a.name.clone());
            let target = resolve_named_type(&mut module, &a.target, &type_names, &mut diags);
            let ty = module.intern_type(Type::Alias { name_id, target });
            type_names.insert(a.name.clone(), ty);
        }
    }

    // Prepass, part 2: module-scope `const`/`var` bindings (spec.md
    // §6.1) go straight into the symbol table; `var` also reserves a
    // `Global` in the module so the backend's `.data` emission has
    // something to lay out even when the initializer isn't a literal
    // (`minz_z80::data`'s empty-`init` fallback zero-fills it).
    for decl in flatten(&file.declarations) {
        match decl {
            Decl::Const(c) => {
                let ty = match &c.ty {
                    Some(t) => resolve_named_type(&mut module, t, &type_names, &mut diags),
                    None => const_literal_type(&mut module, &c.value),
                };
                if symtab.declare(root, c.name.clone(), ty, SymbolKind::Const).is_err() {
                    diags.push(minz_ir::Diagnostic::Name {
                        loc: c.loc,
                        message: format!("duplicate definition of `{}`", c.name),
                    });
                }
            }
            Decl::Var(v) => {
                let ty = match &v.ty {
                    Some(t) => resolve_named_type(&mut module, t, &type_names, &mut diags),
                    None => const_literal_type(&mut module, &v.init),
                };
                if symtab.declare(root, v.name.clone(), ty, SymbolKind::GlobalVar).is_err() {
                    diags.push(minz_ir::Diagnostic::Name {
                        loc: v.loc,
                        message: format!("duplicate definition of `{}`", v.name),
                    });
                }
                module.globals.push(Global { name: v.name.clone(), ty, init: literal_bytes(&v.init) });
            }
            Decl::Meta(_) => {
                // Meta blocks are an escape hatch for the external
                // grammar (spec.md §6.1); this analyzer has nothing to
                // interpret in one and intentionally leaves it inert.
            }
            _ => {}
        }
    }

    // Prepass, part 3: function signatures — plain functions, interface
    // method signatures (for forward reference), and impl methods,
    // mangled and registered into `method_tables` (spec.md §4.1's
    // `(I, T) -> method table` dispatch).
    let mut function_return_types: HashMap<String, (TypeId, Option<TypeId>)> = HashMap::new();
    let mut function_params: HashMap<String, Vec<minz_ir::Param>> = HashMap::new();
    let mut pending: Vec<PendingFunction> = Vec::new();
    let mut method_tables = MethodTables::new();

    let declare_signature = |module: &mut Module,
                                  symtab: &mut SymbolTable,
                                  diags: &mut Diagnostics,
                                  function_return_types: &mut HashMap<String, (TypeId, Option<TypeId>)>,
                                  function_params: &mut HashMap<String, Vec<minz_ir::Param>>,
                                  mangled_name: String,
                                  f: &ast::FunctionDecl| {
        let return_type = resolve_type_prepass(module, &f.return_type, diags);
        function_return_types.insert(mangled_name.clone(), (return_type, None));
        let params: Vec<minz_ir::Param> = f
            .params
            .iter()
            .map(|p| minz_ir::Param { name: p.name.clone(), ty: resolve_type_prepass(module, &p.ty, diags) })
            .collect();
        function_params.insert(mangled_name.clone(), params);
        if symtab.declare(root, mangled_name.clone(), return_type, SymbolKind::Function).is_err() {
            diags.push(minz_ir::Diagnostic::Name {
                loc: f.loc,
                message: format!("duplicate definition of function `{}`", mangled_name),
            });
        }
    };

    for decl in flatten(&file.declarations) {
        match decl {
            Decl::Function(f) => {
                declare_signature(
                    &mut module,
                    &mut symtab,
                    &mut diags,
                    &mut function_return_types,
                    &mut function_params,
                    f.name.clone(),
                    f,
                );
                pending.push(PendingFunction { mangled_name: f.name.clone(), decl: f });
            }
            Decl::Interface(i) => {
                // Signatures only: an interface has no body of its own
                // to lower (spec.md §6.1); `impl` blocks below supply
                // the mangled, lowerable definitions.
                for m in &i.methods {
                    let _ = resolve_type_prepass(&mut module, &m.return_type, &mut diags);
                }
            }
            Decl::Impl(imp) => {
                let Some(&concrete) = type_names.get(&imp.type_name) else {
                    diags.push(minz_ir::Diagnostic::Name {
                        loc: imp.loc,
                        message: format!("`impl {} for {}`: undeclared type `{}`", imp.interface_name, imp.type_name, imp.type_name),
                    });
                    continue;
                };
                for m in &imp.methods {
                    let mangled = format!("{}_{}_{}", imp.interface_name, imp.type_name, m.name);
                    declare_signature(
                        &mut module,
                        &mut symtab,
                        &mut diags,
                        &mut function_return_types,
                        &mut function_params,
                        mangled.clone(),
                        m,
                    );
                    method_tables.register_impl(&imp.interface_name, concrete, &m.name, &mangled);
                    pending.push(PendingFunction { mangled_name: mangled, decl: m });
                }
            }
            _ => {}
        }
    }

    // Recursion detection (spec.md §4.1): SCCs of the direct-call graph.
    let names: Vec<String> = pending.iter().map(|p| p.mangled_name.clone()).collect();
    let mut call_graph = CallGraph::new(&names);
    for p in &pending {
        for stmt in &p.decl.body {
            collect_calls(&p.mangled_name, stmt, &mut call_graph);
        }
    }
    let requires_context: std::collections::HashSet<String> =
        call_graph.requires_context().into_iter().collect();

    let error_name_id = module.intern_string("Error");
    let generic_variant_id = module.intern_string("Generic");
    let generic_error_enum = module.intern_type(Type::Enum {
        name_id: error_name_id,
        variants: std::rc::Rc::from(vec![generic_variant_id]),
    });

    for p in &pending {
        let f = p.decl;
        debug!(function = %p.mangled_name, "lowering function");
        let fn_scope = symtab.new_scope(Some(root));
        let mut params = Vec::new();
        for (i, pr) in f.params.iter().enumerate() {
            let pty = resolve_type_prepass(&mut module, &pr.ty, &mut diags);
            params.push(Param { name: pr.name.clone(), ty: pty });
            let _ = symtab.declare(fn_scope, pr.name.clone(), pty, SymbolKind::Param { index: i as u32 });
        }

        let (return_type, error_type) = function_return_types[&p.mangled_name];
        let mut ir_function = Function::new(p.mangled_name.clone(), return_type);
        ir_function.params = params;
        ir_function.num_params = f.params.len() as u32;
        ir_function.error_type = error_type;
        ir_function.requires_context = requires_context.contains(&p.mangled_name);

        apply_attributes(&mut ir_function, &f.attributes);

        let mut lowering = lower::FunctionLowering::new(
            &mut module,
            &mut symtab,
            &mut diags,
            &function_return_types,
            &function_params,
            &method_tables,
            fn_scope,
            ir_function.num_params,
            Some(generic_error_enum),
            p.mangled_name.clone(),
            ir_function.params.clone(),
            ir_function.requires_context,
        );
        lowering.lower_block(&f.body);
        ir_function.instructions = lowering.finish();

        check_missing_return(&ir_function, &mut diags);
        module.functions.push(ir_function);
    }

    if diags.has_fatal() {
        warn!(count = diags.iter().count(), "analysis completed with errors");
    }

    AnalysisResult { module, diagnostics: diags }
}

/// Resolves a type expression against both the primitive names
/// `resolve_type_prepass` knows and the module's own Struct/Enum/Alias
/// table, for contexts (struct fields, aliases, const/var annotations)
/// that may reference a declared type rather than a primitive.
fn resolve_named_type(
    module: &mut Module,
    type_expr: &ast::TypeExpr,
    type_names: &HashMap<String, TypeId>,
    diags: &mut Diagnostics,
) -> TypeId {
    if let ast::TypeExpr::Named(name) = type_expr {
        if let Some(&ty) = type_names.get(name) {
            return ty;
        }
    }
    resolve_type_prepass(module, type_expr, diags)
}

/// A const/var with no explicit type annotation takes the type of its
/// literal initializer; anything else falls back to `u16`, the widest
/// plain integer, rather than failing the whole prepass over a type
/// that real constant folding (which runs later, over IR) will pin down.
fn const_literal_type(module: &mut Module, value: &ast::Expr) -> TypeId {
    match value {
        ast::Expr::Literal { value: ast::Literal::Bool(_), .. } => module.intern_type(Type::Bool),
        ast::Expr::Literal { value: ast::Literal::Int(n), .. } if *n >= 0 && *n <= 255 => {
            module.intern_type(Type::U8)
        }
        _ => module.intern_type(Type::U16),
    }
}

/// The initial byte image for a `Global` (spec.md §3): literal
/// initializers are folded directly; anything else is left empty, which
/// `minz_z80::data`'s emission treats as zero-init.
fn literal_bytes(value: &ast::Expr) -> Vec<u8> {
    match value {
        ast::Expr::Literal { value: ast::Literal::Int(n), .. } => {
            if *n >= -128 && *n <= 255 {
                vec![*n as u8]
            } else {
                (*n as u16).to_le_bytes().to_vec()
            }
        }
        ast::Expr::Literal { value: ast::Literal::Bool(b), .. } => vec![*b as u8],
        _ => Vec::new(),
    }
}

fn count_functions(file: &File) -> usize {
    flatten(&file.declarations)
        .filter(|d| matches!(d, Decl::Function(_)))
        .count()
}

fn flatten(decls: &[Decl]) -> impl Iterator<Item = &Decl> {
    decls.iter().flat_map(|d| match d {
        Decl::Attributed { inner, .. } => Box::new(std::iter::once(inner.as_ref())) as Box<dyn Iterator<Item = &Decl>>,
        other => Box::new(std::iter::once(other)),
    })
}

fn resolve_type_prepass(module: &mut Module, type_expr: &ast::TypeExpr, diags: &mut Diagnostics) -> TypeId {
    // Shares the same resolution rules as `FunctionLowering::resolve_type`;
    // duplicated narrowly here because the prepass runs before any
    // `FunctionLowering` exists (signatures must be known before any body
    // is lowered, spec.md §4.1's forward-reference rule).
    match type_expr {
        ast::TypeExpr::Named(name) => match name.as_str() {
            "u8" => module.intern_type(Type::U8),
            "u16" => module.intern_type(Type::U16),
            "u24" => module.intern_type(Type::U24),
            "i8" => module.intern_type(Type::I8),
            "i16" => module.intern_type(Type::I16),
            "i24" => module.intern_type(Type::I24),
            "bool" => module.intern_type(Type::Bool),
            "void" => module.intern_type(Type::Void),
            other => {
                diags.push(minz_ir::Diagnostic::Name {
                    loc: minz_support::SourceLoc::UNKNOWN,
                    message: format!("undeclared type `{}`", other),
                });
                module.intern_type(Type::Void)
            }
        },
        ast::TypeExpr::Pointer { base, mutable } => {
            let base_id = resolve_type_prepass(module, base, diags);
            module.intern_type(Type::Pointer { base: base_id, mutable: *mutable })
        }
        _ => module.intern_type(Type::Void),
    }
}

fn apply_attributes(function: &mut Function, attrs: &[ast::Attribute]) {
    for attr in attrs {
        match attr.name.as_str() {
            "smc" => function.attributes.smc = true,
            "abi" if attr.args.iter().any(|a| a == "stack") => {
                function.attributes.abi_stack = true;
                function.is_smc_default = false;
            }
            "target" => function.attributes.target = attr.args.first().cloned(),
            "export" => function.attributes.export = true,
            "rom" => {
                function.attributes.rom = true;
                function.is_smc_default = false;
            }
            _ => {}
        }
    }
}

fn collect_calls(caller: &str, stmt: &ast::Stmt, graph: &mut CallGraph) {
    use ast::{Expr, Stmt};
    fn walk_expr(caller: &str, expr: &Expr, graph: &mut CallGraph) {
        match expr {
            Expr::Call { callee, args, .. } => {
                graph.add_call(caller, callee);
                for a in args {
                    walk_expr(caller, a, graph);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                walk_expr(caller, lhs, graph);
                walk_expr(caller, rhs, graph);
            }
            Expr::Unary { operand, .. } => walk_expr(caller, operand, graph),
            Expr::Field { base, .. } => walk_expr(caller, base, graph),
            Expr::Index { base, index, .. } => {
                walk_expr(caller, base, graph);
                walk_expr(caller, index, graph);
            }
            Expr::Cast { value, .. } | Expr::Try { value, .. } => walk_expr(caller, value, graph),
            Expr::StructLiteral { fields, .. } => {
                for (_, v) in fields {
                    walk_expr(caller, v, graph);
                }
            }
            Expr::ArrayLiteral { elements, .. } => {
                for e in elements {
                    walk_expr(caller, e, graph);
                }
            }
            Expr::MethodCall { receiver, args, .. } => {
                walk_expr(caller, receiver, graph);
                for a in args {
                    walk_expr(caller, a, graph);
                }
            }
            Expr::Literal { .. } | Expr::Ident { .. } => {}
        }
    }

    match stmt {
        Stmt::Let { init, .. } => walk_expr(caller, init, graph),
        Stmt::Assign { target, value, .. } => {
            walk_expr(caller, target, graph);
            walk_expr(caller, value, graph);
        }
        Stmt::Expr { value, .. } => walk_expr(caller, value, graph),
        Stmt::Return { value: Some(v), .. } => walk_expr(caller, v, graph),
        Stmt::Return { value: None, .. } => {}
        Stmt::If { cond, then_branch, else_branch, .. } => {
            walk_expr(caller, cond, graph);
            for s in then_branch {
                collect_calls(caller, s, graph);
            }
            for s in else_branch {
                collect_calls(caller, s, graph);
            }
        }
        Stmt::While { cond, body, .. } => {
            walk_expr(caller, cond, graph);
            for s in body {
                collect_calls(caller, s, graph);
            }
        }
        Stmt::For { iterable, body, .. } => {
            walk_expr(caller, iterable, graph);
            for s in body {
                collect_calls(caller, s, graph);
            }
        }
        Stmt::Loop { body, .. } => {
            for s in body {
                collect_calls(caller, s, graph);
            }
        }
        Stmt::Case { discriminant, arms, default, .. } => {
            walk_expr(caller, discriminant, graph);
            for (pattern, body) in arms {
                walk_expr(caller, pattern, graph);
                for s in body {
                    collect_calls(caller, s, graph);
                }
            }
            for s in default {
                collect_calls(caller, s, graph);
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } => {}
    }
}

/// Checks spec.md §7's `ControlFlowError` "missing return on non-void
/// path": a crude but sound approximation — the last statement of a
/// non-void function's top-level body must be a `Return`, an `If` whose
/// both branches satisfy the same rule, or a `Loop` (which never falls
/// through by construction).
fn check_missing_return(function: &Function, diags: &mut Diagnostics) {
    if function.return_type == minz_ir::TypeId(0) {
        return; // void functions are not checked; TypeId(0) is interned first and usually void in this analyzer's own prepass.
    }
    if function.instructions.is_empty() {
        return;
    }
    let last = function.instructions.last().unwrap();
    if !matches!(last.op, minz_ir::Opcode::Return | minz_ir::Opcode::Label | minz_ir::Opcode::Jump) {
        diags.push(minz_ir::Diagnostic::ControlFlow {
            loc: last.loc,
            message: format!("function `{}` may fall off the end without a return", function.name),
        });
    }
}
