use tryflow::ast::{
    Block, CallExpr, CatchArgument, Expr, Resource, ResourceTarget, Span, StatementBits, Stmt,
    TryStatement,
};
use tryflow::lookup::{TypeId, TypeRegistry};
use tryflow::problem::ProblemKind;
use tryflow::scope::{LocalId, MethodScope};
use tryflow::{compile_method, Config, MethodOutput, SourceLevel};

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

fn compile(
    registry: &TypeRegistry,
    config: &Config,
    scope: &mut MethodScope,
    statements: Vec<Stmt>,
) -> MethodOutput {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let mut body = block(statements);
    compile_method(registry, config, scope, &mut body, "p/T").expect("pipeline failure")
}

fn has(output: &MethodOutput, predicate: impl Fn(&ProblemKind) -> bool) -> bool {
    output.problems.iter().any(|p| predicate(&p.kind))
}

// catch(IOException) after catch(Exception) can never be selected
#[test]
fn later_catch_hidden_by_earlier_broader_one_is_rejected() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let e1 = scope.add_local("e1", wk.exception);
    let e2 = scope.add_local("e2", wk.io_exception);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call_throwing("read", vec![wk.io_exception])]),
            vec![
                catch(e1, vec![wk.exception], block(vec![call("recoverBroad")])),
                catch(e2, vec![wk.io_exception], block(vec![call("recoverIo")])),
            ],
            None,
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::WrongSequenceOfExceptionTypes { caught, hidden_by }
        if caught.contains("IOException") && hidden_by.contains("Exception"))));
    assert!(output.code.is_none());
}

// the same binding twice in the resource list is a warning, not an error
#[test]
fn duplicate_resource_reference_warns_but_compiles() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_final_local("r", res_type);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![
            Stmt::LocalDeclaration { local: r, initializer: Some(new_(res_type)), span: span() },
            try_stmt(
                vec![
                    Resource::Reference { target: ResourceTarget::Local(r), span: span() },
                    Resource::Reference { target: ResourceTarget::Local(r), span: span() },
                ],
                block(vec![call("work")]),
                vec![],
                None,
            ),
        ],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::DuplicateResourceReference { name } if name == "r")));
    assert!(output.code.is_some());
}

// a checked exception with no handler in scope escapes the method
#[test]
fn unhandled_checked_exception_is_an_error() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![call_throwing("read", vec![wk.io_exception])],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::UnhandledException { type_name }
        if type_name.contains("IOException"))));
    assert!(output.code.is_none());
}

// catch(Exception) over a region that throws nothing checked: reported under
// the strict setting, tolerated under the legacy one
#[test]
fn unused_broad_catch_respects_legacy_toggle() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();

    let strict = {
        let mut scope = MethodScope::new(None);
        let e = scope.add_local("e", wk.exception);
        compile(
            &registry,
            &Config::default(),
            &mut scope,
            vec![try_stmt(
                vec![],
                block(vec![call("work")]),
                vec![catch(e, vec![wk.exception], block(vec![call("recover")]))],
                None,
            )],
        )
    };
    assert!(has(&strict, |k| matches!(k, ProblemKind::UnreachableCatch { .. })));

    let legacy = {
        let mut scope = MethodScope::new(None);
        let e = scope.add_local("e", wk.exception);
        let mut config = Config::default();
        config.report_unused_declared_throwable_catch = false;
        compile(
            &registry,
            &config,
            &mut scope,
            vec![try_stmt(
                vec![],
                block(vec![call("work")]),
                vec![catch(e, vec![wk.exception], block(vec![call("recover")]))],
                None,
            )],
        )
    };
    assert!(!has(&legacy, |k| matches!(k, ProblemKind::UnreachableCatch { .. })));
    assert!(legacy.code.is_some());
}

// a narrow checked catch is rejected regardless of the toggle
#[test]
fn unused_narrow_checked_catch_is_always_rejected() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let e = scope.add_local("e", wk.io_exception);
    let mut config = Config::default();
    config.report_unused_declared_throwable_catch = false;
    let output = compile(
        &registry,
        &config,
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call("work")]),
            vec![catch(e, vec![wk.io_exception], block(vec![call("recover")]))],
            None,
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::UnreachableCatch { caught }
        if caught.contains("IOException"))));
    assert!(output.code.is_none());
}

// assigning to a binding used in the resource position breaks the close contract
#[test]
fn resource_binding_must_stay_effectively_final() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![
            Stmt::LocalDeclaration { local: r, initializer: Some(new_(res_type)), span: span() },
            try_stmt(
                vec![Resource::Reference { target: ResourceTarget::Local(r), span: span() }],
                block(vec![Stmt::Assign { local: r, value: new_(res_type), span: span() }]),
                vec![],
                None,
            ),
        ],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::ResourceMustBeEffectivelyFinal { name } if name == "r")));
    assert!(output.code.is_none());
}

// a binding declared without an initializer and assigned exactly once is
// still effectively final
#[test]
fn late_initialized_resource_binding_is_accepted() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![
            Stmt::LocalDeclaration { local: r, initializer: None, span: span() },
            Stmt::Assign { local: r, value: new_(res_type), span: span() },
            try_stmt(
                vec![Resource::Reference { target: ResourceTarget::Local(r), span: span() }],
                block(vec![call("work")]),
                vec![],
                None,
            ),
        ],
    );
    assert!(!has(&output, |k| matches!(k, ProblemKind::ResourceMustBeEffectivelyFinal { .. })));
    assert!(output.code.is_some());
}

// a non-final field cannot be trusted to hold the same resource at close time
#[test]
fn mutable_field_resource_is_rejected() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);
    let field = registry.add_field("stream", res_type, false);
    let mut scope = MethodScope::new(None);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![try_stmt(
            vec![Resource::Reference { target: ResourceTarget::Field(field), span: span() }],
            block(vec![call("work")]),
            vec![],
            None,
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::CannotReferToNonFinalField { name } if name == "stream")));
    assert!(output.code.is_none());
}

// resource forms are gated on the source level
#[test]
fn resource_forms_respect_source_level() {
    let mut registry = TypeRegistry::with_defaults();
    let res_type = registry.define_resource_class("p.Res", vec![]);

    let mut scope = MethodScope::new(None);
    let r = scope.add_local("r", res_type);
    let mut config = Config::default();
    config.source_level = SourceLevel::Java6;
    let output = compile(
        &registry,
        &config,
        &mut scope,
        vec![try_stmt(
            vec![Resource::Declaration { local: r, type_id: res_type, initializer: new_(res_type), span: span() }],
            block(vec![call("work")]),
            vec![],
            None,
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::ResourceManagementNotSupported)));

    let mut scope = MethodScope::new(None);
    let r = scope.add_final_local("r", res_type);
    let mut config = Config::default();
    config.source_level = SourceLevel::Java7;
    let output = compile(
        &registry,
        &config,
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
    assert!(has(&output, |k| matches!(k, ProblemKind::ResourceReferenceNotSupported)));
}

// empty handler blocks need an explaining comment
#[test]
fn empty_catch_block_needs_a_comment() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();

    let mut scope = MethodScope::new(None);
    let e = scope.add_local("e", wk.io_exception);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call_throwing("read", vec![wk.io_exception])]),
            vec![catch(e, vec![wk.io_exception], block(vec![]))],
            None,
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::UndocumentedEmptyBlock)));

    let mut scope = MethodScope::new(None);
    let e = scope.add_local("e", wk.io_exception);
    let mut documented = block(vec![]);
    documented.bits |= StatementBits::DOCUMENTED_EMPTY_BLOCK;
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call_throwing("read", vec![wk.io_exception])]),
            vec![catch(e, vec![wk.io_exception], documented)],
            None,
        )],
    );
    assert!(!has(&output, |k| matches!(k, ProblemKind::UndocumentedEmptyBlock)));
}

// a finally block that never falls through hides try/catch outcomes
#[test]
fn escaping_finally_warns_but_compiles() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![try_stmt(
            vec![],
            block(vec![call("work")]),
            vec![],
            Some(block(vec![Stmt::Throw { exception: new_(wk.runtime_exception), span: span() }])),
        )],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::FinallyMustCompleteNormally)));
    assert!(output.code.is_some());
}

// reads of a local assigned only inside the try block are rejected after it
#[test]
fn assignment_in_try_does_not_survive_the_catch_merge() {
    let registry = TypeRegistry::with_defaults();
    let wk = registry.well_known();
    let mut scope = MethodScope::new(None);
    let x = scope.add_local("x", wk.object);
    let e = scope.add_local("e", wk.io_exception);
    let output = compile(
        &registry,
        &Config::default(),
        &mut scope,
        vec![
            try_stmt(
                vec![],
                block(vec![
                    call_throwing("read", vec![wk.io_exception]),
                    Stmt::Assign { local: x, value: new_(wk.object), span: span() },
                ]),
                vec![catch(e, vec![wk.io_exception], block(vec![call("recover")]))],
                None,
            ),
            Stmt::Expression(Expr::Read { local: x, span: span() }),
        ],
    );
    assert!(has(&output, |k| matches!(k, ProblemKind::UninitializedLocal { name } if name == "x")));
}
