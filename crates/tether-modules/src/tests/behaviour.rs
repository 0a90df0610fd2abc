//! Behaviour tests for module registration and dispatch.
//!
//! Structured as given/when/then steps over a shared test world, covering
//! the registry-to-outcome flow as one behaviour rather than per-unit.

use std::cell::RefCell;

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::error::ModuleError;
use crate::internal::InternalModule;
use crate::module::Module;
use crate::outcome::ActionOutcome;
use crate::registry::ModuleRegistry;
use crate::request::{ActionRequest, ParsedChunks, RequestDescriptor};
use crate::schema::SchemaError;

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TestWorld {
    registry: ModuleRegistry,
    outcome: Option<Result<ActionOutcome, ModuleError>>,
    validation: Option<Result<(), SchemaError>>,
}

#[fixture]
fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}

fn reflecting_module(name: &str) -> Module {
    let mut module = InternalModule::new(name, "reflects its input");
    module
        .register_action(
            "reflect",
            &json!({
                "type": "object",
                "properties": { "x": { "type": "string" } },
                "required": ["x"]
            }),
            &json!({
                "type": "object",
                "properties": { "y": { "type": "string" } },
                "required": ["y"]
            }),
            Box::new(|request| {
                let x = request
                    .params()
                    .get("x")
                    .and_then(Value::as_str)
                    .ok_or_else(|| String::from("missing input 'x'"))?;
                Ok(json!({"y": x}))
            }),
        )
        .expect("register reflect");
    Module::from(module)
}

fn reflect_request(module: &str, params: Value) -> ActionRequest {
    ActionRequest::blocking(
        RequestDescriptor {
            id: "r1".into(),
            transaction_id: "t1".into(),
            sender: "broker/controller_1".into(),
            module: module.into(),
            action: "reflect".into(),
            params,
        },
        ParsedChunks::default(),
    )
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn given_a_reflecting_module(world: &RefCell<TestWorld>, name: &str) {
    world
        .borrow_mut()
        .registry
        .register(reflecting_module(name))
        .expect("register module");
}

fn when_the_module_reflects(world: &RefCell<TestWorld>, name: &str, input: &str) {
    let request = reflect_request(name, json!({"x": input}));
    let mut w = world.borrow_mut();
    let module = w.registry.get(name).expect("module resolves");
    module
        .validate_input(request.action(), request.params())
        .expect("input conforms");
    let outcome = module.call(&request);
    w.outcome = Some(outcome);
}

fn when_input_is_validated(world: &RefCell<TestWorld>, name: &str, params: Value) {
    let mut w = world.borrow_mut();
    let module = w.registry.get(name).expect("module resolves");
    let validation = module.validate_input("reflect", &params);
    w.validation = Some(validation);
}

fn then_the_outcome_reflects(world: &RefCell<TestWorld>, expected: &str) {
    let w = world.borrow();
    let outcome = w
        .outcome
        .as_ref()
        .expect("no outcome captured")
        .as_ref()
        .expect("expected success");
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.results(), &json!({"y": expected}));
}

fn then_the_validation_is_rejected(world: &RefCell<TestWorld>) {
    let w = world.borrow();
    let validation = w.validation.as_ref().expect("no validation captured");
    assert!(matches!(validation, Err(SchemaError::Rejected { .. })));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[rstest]
fn a_reflecting_module_echoes_its_input_through_the_registry(world: RefCell<TestWorld>) {
    given_a_reflecting_module(&world, "mirror");
    when_the_module_reflects(&world, "mirror", "hi");
    then_the_outcome_reflects(&world, "hi");
}

#[rstest]
fn nonconforming_input_is_rejected_before_dispatch(world: RefCell<TestWorld>) {
    given_a_reflecting_module(&world, "mirror");
    when_input_is_validated(&world, "mirror", json!({"x": 42}));
    then_the_validation_is_rejected(&world);
}

#[rstest]
fn modules_outside_the_registry_do_not_resolve(world: RefCell<TestWorld>) {
    given_a_reflecting_module(&world, "mirror");
    assert!(world.borrow().registry.get("prism").is_none());
}
