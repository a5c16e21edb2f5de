use tryflow::ast::{
    Block, CallExpr, CatchArgument, Expr, Resource, ResourceTarget, Span, Stmt, TryStatement,
};
use tryflow::codegen::Code;
use tryflow::lookup::{TypeId, TypeRegistry};
use tryflow::scope::{LocalId, MethodScope};
use tryflow::{compile_method, Config};

fn span() -> Span {
    Span::default()
}

fn block(statements: Vec<Stmt>) -> Block {
    Block::new(statements, span())
}

fn new_(type_id: TypeId) -> Expr {
    Expr::New { type_id, span: span() }
}

fn call_throwing(name: &str, declared_thrown: Vec<TypeId>) -> Stmt {
    Stmt::Expression(Expr::Call(CallExpr {
        name: name.to_string(),
        arguments: vec![],
        declared_thrown,
        return_type: None,
        span: span(),
    }))
}

fn call(name: &str) -> Stmt {
    call_throwing(name, vec![])
}

fn catch(local: LocalId, types: Vec<TypeId>, body: Block) -> (CatchArgument, Block) {
    (CatchArgument { local, types, span: span() }, body)
}

fn try_stmt(
    resources: Vec<Resource>,
    try_block: Block,
    catches: Vec<(CatchArgument, Block)>,
    finally_block: Option<Block>,
) -> Stmt {
    let (arguments, blocks) = catches.into_iter().unzip();
    Stmt::Try(Box::new(TryStatement::new(resources, try_block, arguments, blocks, finally_block, span())))
}

fn generate(registry: &TypeRegistry, scope: &mut MethodScope, statements: Vec<Stmt>) -> Code {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let config = Config::default();
    let mut body = block(statements);
    let output = compile_method(registry, &config, scope, &mut body, "p/T").expect("pipeline failure");
    match output.code {
        Some(code) => code,
        None => panic!("unexpected problems: {:?}", output.problems),
    }
}

fn declaration(local: LocalId, type_id: TypeId) -> Resource {
    Resource::Declaration { local, type_id, initializer: new_(type_id), span: span() }
}

// resources close in reverse acquisition order, on both the normal and the
// exceptional path
#[test]
fn resources_close_in_reverse_order_exactly_once_per_path() {
    let mut registry = TypeRegistry::with_defaults();
    let first = registry.define_resource_class("p.First", vec![]);
    let second = registry.define_resource_class("p.Second", vec![]);
    let mut scope = MethodScope::new(None);
    let r1 = scope.add_local("r1", first);
    let r2 = scope.add_local("r2", second);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![declaration(r1, first), declaration(r2, second)],
            block(vec![call("work")]),
            vec![],
            None,
        )],
    );
    let listing = code.disassemble();
    assert_eq!(listing.matches("p/First.close").count(), 2);
    assert_eq!(listing.matches("p/Second.close").count(), 2);
    let first_close = listing.find("p/First.close").unwrap();
    let second_close = listing.find("p/Second.close").unwrap();
    assert!(second_close < first_close, "second resource must close first:\n{listing}");
}

// a close failure during exceptional teardown is attached to the primary
// exception instead of replacing it
#[test]
fn close_failure_is_suppressed_under_the_primary_exception() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![declaration(r, res_type)],
            block(vec![call("work")]),
            vec![],
            None,
        )],
    );
    let listing = code.disassemble();
    // self-suppression guard, then the merge, then the rethrow
    assert!(listing.contains("if_acmpeq"));
    assert_eq!(listing.matches("java/lang/Throwable.addSuppressed").count(), 1);
    assert!(listing.contains("athrow"));
    // every close is guarded against a null resource slot
    assert!(listing.matches("ifnull").count() >= 2);
}

// an existing reference in the resource position is closed but never stored
#[test]
fn reference_resource_is_closed_without_acquisition_code() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_final_local("r", res_type);
    let code = generate(
        &registry,
        &mut scope,
        vec![
            Stmt::LocalDeclaration { local: r, initializer: Some(new_(res_type)), span: span() },
            try_stmt(
                vec![Resource::Reference { target: ResourceTarget::Local(r), span: span() }],
                block(vec![call("work")]),
                vec![],
                None,
            ),
        ],
    );
    let listing = code.disassemble();
    assert_eq!(listing.matches("p/Res.close").count(), 2);
    // exactly one store of the resource local: its declaration
    assert_eq!(listing.matches("new p/Res").count(), 1);
}

// an exception from the protected region dispatches to the resource-close
// handlers first; the declared catch only sees the rethrown primary
#[test]
fn resource_close_rows_dispatch_before_declared_catch_rows() {
    let mut registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let e = scope.add_local("e", wk.io_exception);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![declaration(r, res_type)],
            block(vec![call_throwing("read", vec![wk.io_exception])]),
            vec![catch(e, vec![wk.io_exception], block(vec![call("recover")]))],
            None,
        )],
    );
    let table = code.exception_table();
    let io_index = table
        .iter()
        .position(|row| row.catch_type.as_deref() == Some("java/io/IOException"))
        .expect("row for IOException");
    let close_rows: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, row)| row.catch_type.is_none())
        .map(|(index, _)| index)
        .collect();
    assert!(!close_rows.is_empty());
    assert!(
        close_rows.iter().all(|&index| index < io_index),
        "close regions must dispatch before the catch: {table:?}"
    );
    // the catch range still covers the close protocol's rethrow sites
    assert!(close_rows.iter().all(|&index| table[index].end_pc <= table[io_index].end_pc));
    let listing = code.disassemble();
    assert_eq!(listing.matches("p/Res.close").count(), 2);
    assert!(listing.contains("p/T.recover"));
}

// every alternative of a multi-catch union dispatches to the same handler
#[test]
fn union_catch_shares_one_handler_across_alternatives() {
    let mut registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let other = registry.define_exception("p.OtherException", wk.exception);
    let mut scope = MethodScope::new(None);
    let e = scope.add_local("e", wk.exception);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call_throwing("read", vec![wk.io_exception, other])]),
            vec![catch(e, vec![wk.io_exception, other], block(vec![call("recover")]))],
            None,
        )],
    );
    let table = code.exception_table();
    let io_row = table
        .iter()
        .find(|row| row.catch_type.as_deref() == Some("java/io/IOException"))
        .expect("row for IOException");
    let other_row = table
        .iter()
        .find(|row| row.catch_type.as_deref() == Some("p/OtherException"))
        .expect("row for p.OtherException");
    assert_eq!(io_row.handler_pc, other_row.handler_pc);
    assert_eq!(code.disassemble().matches("p/T.recover").count(), 1);
}

// a finally block that never completes is emitted once behind a shared label;
// nothing is inlined at the exits
#[test]
fn escaping_finally_is_shared_not_inlined() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call("work"), Stmt::Return { value: None, span: span() }]),
            vec![],
            Some(block(vec![
                call("cleanup"),
                Stmt::Throw { exception: new_(wk.runtime_exception), span: span() },
            ])),
        )],
    );
    let listing = code.disassemble();
    assert_eq!(listing.matches("p/T.cleanup").count(), 1);
    // the return inside the try is rerouted into the finally block
    assert!(listing.contains("goto"));
    assert_eq!(listing.matches("return").count(), 0);
}

// break crossing a finally block runs the inlined finally before the jump
#[test]
fn break_through_finally_inlines_the_finally_block() {
    let registry = TypeRegistry::with_defaults();
    let mut scope = MethodScope::new(None);
    let code = generate(
        &registry,
        &mut scope,
        vec![
            Stmt::Loop {
                body: block(vec![try_stmt(
                    vec![],
                    block(vec![call("work"), Stmt::Break { span: span() }]),
                    vec![],
                    Some(block(vec![call("cleanup")])),
                )]),
                span: span(),
            },
            call("after"),
        ],
    );
    let listing = code.disassemble();
    // once on the break path, once in the any-exception handler
    assert_eq!(listing.matches("p/T.cleanup").count(), 2);
    assert!(listing.contains("p/T.after"));
    assert!(listing.contains("athrow"));
}

// the caught exception lands in the catch argument's slot before its block runs
#[test]
fn catch_handler_stores_the_exception_and_runs_its_block() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let e = scope.add_local("e", wk.io_exception);
    let code = generate(
        &registry,
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call_throwing("read", vec![wk.io_exception])]),
            vec![catch(e, vec![wk.io_exception], block(vec![call("recover")]))],
            None,
        )],
    );
    let listing = code.disassemble();
    assert!(listing.contains("astore"));
    assert!(listing.contains("p/T.recover"));
    let table = code.exception_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].catch_type.as_deref(), Some("java/io/IOException"));
}

// identical inputs produce identical bytecode and identical snapshot tables
#[test]
fn generation_is_deterministic_for_identical_inputs() {
    let build = || {
        let mut registry = TypeRegistry::with_defaults();
        let res_type = registry.define_resource_class("p.Res", vec![]);
        let wk = registry.well_known();
        let mut scope = MethodScope::new(None);
        let r = scope.add_local("r", res_type);
        let e = scope.add_local("e", wk.runtime_exception);
        let code = generate(
            &registry,
            &mut scope,
            vec![try_stmt(
                vec![declaration(r, res_type)],
                block(vec![call("work")]),
                vec![catch(e, vec![wk.runtime_exception], block(vec![call("recover")]))],
                Some(block(vec![call("cleanup")])),
            )],
        );
        (code.bytes().to_vec(), scope.recorded_state_count())
    };
    let (bytes_a, states_a) = build();
    let (bytes_b, states_b) = build();
    assert_eq!(bytes_a, bytes_b);
    assert_eq!(states_a, states_b);
}

// local liveness ranges follow the snapshots: a resource local dies with its
// protected region
#[test]
fn resource_local_liveness_ends_with_the_statement() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let code = generate(
        &registry,
        &mut scope,
        vec![
            try_stmt(
                vec![declaration(r, res_type)],
                block(vec![call("work")]),
                vec![],
                None,
            ),
            call("after"),
        ],
    );
    let ranges: Vec<_> = code.live_ranges().iter().filter(|range| range.local == r).collect();
    assert!(!ranges.is_empty());
    assert!(ranges.iter().all(|range| range.end_pc.is_some()), "resource local must not stay live");
}
