//! Run instrumented methods, with and without an alternate implementation installed

mod interpreter;

use hotpatch::jvm::class_graph::{ClassData, ClassGraph, MethodData};
use hotpatch::jvm::code::{
    BranchInstruction, Code, CodeBuilder, CodeBuilderExts, Instruction, SynLabel,
};
use hotpatch::jvm::{
    BaseType, BinaryName, ClassAccessFlags, Error as JvmError, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, RefType, UnqualifiedName,
};
use hotpatch::redirect::instrument::{change_field, instrument_entry, register_runtime_types};
use hotpatch::redirect::{RedirectionStrategy, Settings};
use interpreter::{Machine, Trap, Value};
use std::cell::RefCell;
use std::rc::Rc;

const DISPATCH: &str = "com/mogujie/instantrun/IncrementalChange.access$dispatch\
    (Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;";

struct Fixture {
    class_graph: ClassGraph,
    settings: Settings,
    class: BinaryName,
}

impl Fixture {
    fn new() -> Fixture {
        let settings = Settings::new().unwrap();
        let class = BinaryName::from_string(String::from("com/example/Calculator")).unwrap();
        let mut class_graph = ClassGraph::new();
        class_graph.insert_java_library_types();
        class_graph.add_class(ClassData::new(
            class.clone(),
            BinaryName::OBJECT,
            ClassAccessFlags::PUBLIC,
        ));
        register_runtime_types(&mut class_graph, &settings, &class);
        Fixture {
            class_graph,
            settings,
            class,
        }
    }

    fn method(&self, name: &str, descriptor: &str, is_static: bool) -> MethodData {
        let mut access_flags = MethodAccessFlags::PUBLIC;
        if is_static {
            access_flags |= MethodAccessFlags::STATIC;
        }
        MethodData {
            class: self.class.clone(),
            name: UnqualifiedName::from_string(String::from(name)).unwrap(),
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
            access_flags,
        }
    }

    /// Instrument a method, then emit its original body
    fn instrument(
        &self,
        method: MethodData,
        strategy: &RedirectionStrategy,
        body: impl FnOnce(&mut CodeBuilder) -> Result<(), JvmError>,
    ) -> Code {
        let mut code = CodeBuilder::new(&self.class_graph, method);
        instrument_entry(&mut code, &self.settings, strategy).unwrap();
        body(&mut code).unwrap();
        code.result().unwrap()
    }

    fn array_dispatch(&self) -> RedirectionStrategy {
        RedirectionStrategy::array_dispatch(&self.settings)
    }

    fn receiver(&self) -> Value {
        Value::instance(self.class.clone())
    }

    /// Install an alternate implementation in `$change`, returning it
    fn install(&self, machine: &mut Machine) -> Value {
        let alternate = Value::instance(self.settings.override_class(&self.class));
        machine.set_static(&change_field(&self.settings, &self.class), alternate.clone());
        alternate
    }
}

/// Label at which the original body starts
fn original_body(code: &Code) -> SynLabel {
    code.blocks
        .values()
        .find_map(|block| match block.branch_end {
            BranchInstruction::IfNull(_, skip, _) => Some(skip),
            _ => None,
        })
        .unwrap()
}

/// `int compute(int a, int b) { return a + b; }`
fn compute(fixture: &Fixture, strategy: &RedirectionStrategy) -> Code {
    fixture.instrument(fixture.method("compute", "(II)I", false), strategy, |code| {
        code.push_instruction(Instruction::ILoad(1))?;
        code.push_instruction(Instruction::ILoad(2))?;
        code.push_instruction(Instruction::IAdd)?;
        code.return_(&Some(FieldType::int()))
    })
}

type Calls = Rc<RefCell<Vec<Vec<Value>>>>;

/// Host dispatcher recording its arguments and answering with `result`
fn dispatcher(machine: &mut Machine, method: &str, result: Value) -> Calls {
    let calls: Calls = Rc::new(RefCell::new(vec![]));
    let recorded = calls.clone();
    machine.define(method, move |arguments| {
        recorded.borrow_mut().push(arguments);
        Ok(Some(result.clone()))
    });
    calls
}

#[test]
fn no_alternate_runs_original() {
    let fixture = Fixture::new();
    let code = compute(&fixture, &fixture.array_dispatch());

    let mut machine = Machine::new(&fixture.class_graph);
    let calls = dispatcher(&mut machine, DISPATCH, Value::Null);
    let result = machine.run(&code, vec![fixture.receiver(), Value::Int(2), Value::Int(3)]);

    assert_eq!(result, Ok(Some(Value::Int(5))));
    assert!(calls.borrow().is_empty());
    assert!(machine.visited.contains(&original_body(&code)));
}

#[test]
fn alternate_result_is_unboxed() {
    let fixture = Fixture::new();
    let code = compute(&fixture, &fixture.array_dispatch());

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    let calls = dispatcher(
        &mut machine,
        DISPATCH,
        Value::boxed(BaseType::Int, Value::Int(42)),
    );
    let receiver = fixture.receiver();
    let result = machine.run(&code, vec![receiver.clone(), Value::Int(2), Value::Int(3)]);

    assert_eq!(result, Ok(Some(Value::Int(42))));
    assert!(!machine.visited.contains(&original_body(&code)));
    assert_eq!(machine.stack_at_exit, 0);

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    let arguments = &calls[0];
    assert_eq!(arguments[1].as_str(), Some("compute.(II)I"));
    assert_eq!(
        arguments[2].array_elements(),
        Some(vec![
            receiver,
            Value::boxed(BaseType::Int, Value::Int(2)),
            Value::boxed(BaseType::Int, Value::Int(3)),
        ])
    );
}

#[test]
fn any_number_satisfies_numeric_return() {
    let fixture = Fixture::new();
    let code = compute(&fixture, &fixture.array_dispatch());

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(
        &mut machine,
        DISPATCH,
        Value::boxed(BaseType::Long, Value::Long(7)),
    );
    let result = machine.run(&code, vec![fixture.receiver(), Value::Int(2), Value::Int(3)]);

    assert_eq!(result, Ok(Some(Value::Int(7))));
}

#[test]
fn wrongly_typed_result_fails_cast() {
    let fixture = Fixture::new();
    let code = compute(&fixture, &fixture.array_dispatch());

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(&mut machine, DISPATCH, Value::string("forty-two"));
    let result = machine.run(&code, vec![fixture.receiver(), Value::Int(2), Value::Int(3)]);

    assert_eq!(
        result,
        Err(Trap::ClassCast {
            found: RefType::Object(BinaryName::STRING),
            expected: RefType::Object(BinaryName::NUMBER),
        })
    );
}

#[test]
fn void_static_method() {
    // `static void log(String message) { }`
    let fixture = Fixture::new();
    let method = fixture.method("log", "(Ljava/lang/String;)V", true);
    let code = fixture.instrument(method, &fixture.array_dispatch(), |code| code.return_(&None));

    // Without an alternate
    let mut machine = Machine::new(&fixture.class_graph);
    assert_eq!(machine.run(&code, vec![Value::string("hi")]), Ok(None));
    assert!(machine.visited.contains(&original_body(&code)));

    // With an alternate, whose (ignored) result must not linger on the stack
    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    let calls = dispatcher(&mut machine, DISPATCH, Value::string("ignored"));
    let message = Value::string("hi");
    assert_eq!(machine.run(&code, vec![message.clone()]), Ok(None));
    assert_eq!(machine.stack_at_exit, 0);
    assert!(!machine.visited.contains(&original_body(&code)));

    let calls = calls.borrow();
    assert_eq!(calls[0][1].as_str(), Some("log.(Ljava/lang/String;)V"));
    assert_eq!(calls[0][2].array_elements(), Some(vec![message]));
}

#[test]
fn wide_arguments_are_boxed_in_order() {
    // `static double scale(long factor, double value) { return value; }`
    let fixture = Fixture::new();
    let method = fixture.method("scale", "(JD)D", true);
    let code = fixture.instrument(method, &fixture.array_dispatch(), |code| {
        code.push_instruction(Instruction::DLoad(2))?;
        code.return_(&Some(FieldType::double()))
    });
    let arguments = vec![Value::Long(3), Value::Double(1.5)];

    let mut machine = Machine::new(&fixture.class_graph);
    assert_eq!(
        machine.run(&code, arguments.clone()),
        Ok(Some(Value::Double(1.5)))
    );

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    let calls = dispatcher(
        &mut machine,
        DISPATCH,
        Value::boxed(BaseType::Double, Value::Double(4.5)),
    );
    assert_eq!(machine.run(&code, arguments), Ok(Some(Value::Double(4.5))));
    assert_eq!(
        calls.borrow()[0][2].array_elements(),
        Some(vec![
            Value::boxed(BaseType::Long, Value::Long(3)),
            Value::boxed(BaseType::Double, Value::Double(1.5)),
        ])
    );
}

#[test]
fn boolean_needs_exact_wrapper() {
    // `boolean isEnabled() { return false; }`
    let fixture = Fixture::new();
    let method = fixture.method("isEnabled", "()Z", false);
    let code = fixture.instrument(method, &fixture.array_dispatch(), |code| {
        code.push_instruction(Instruction::IConst0)?;
        code.return_(&Some(FieldType::boolean()))
    });

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(
        &mut machine,
        DISPATCH,
        Value::boxed(BaseType::Boolean, Value::Int(1)),
    );
    assert_eq!(
        machine.run(&code, vec![fixture.receiver()]),
        Ok(Some(Value::Int(1)))
    );

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(
        &mut machine,
        DISPATCH,
        Value::boxed(BaseType::Int, Value::Int(1)),
    );
    assert_eq!(
        machine.run(&code, vec![fixture.receiver()]),
        Err(Trap::ClassCast {
            found: RefType::Object(BinaryName::INTEGER),
            expected: RefType::Object(BinaryName::BOOLEAN),
        })
    );
}

#[test]
fn reference_results_are_cast() {
    // `String describe() { return null; }`
    let fixture = Fixture::new();
    let method = fixture.method("describe", "()Ljava/lang/String;", false);
    let code = fixture.instrument(method, &fixture.array_dispatch(), |code| {
        code.push_instruction(Instruction::AConstNull)?;
        code.return_(&Some(FieldType::object(BinaryName::STRING)))
    });

    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(&mut machine, DISPATCH, Value::string("calculator"));
    let result = machine.run(&code, vec![fixture.receiver()]).unwrap();
    assert_eq!(
        result.as_ref().and_then(Value::as_str),
        Some("calculator")
    );

    // `null` passes any cast
    let mut machine = Machine::new(&fixture.class_graph);
    fixture.install(&mut machine);
    dispatcher(&mut machine, DISPATCH, Value::Null);
    assert_eq!(machine.run(&code, vec![fixture.receiver()]), Ok(Some(Value::Null)));
}

#[test]
fn direct_dispatch_passes_native_values() {
    let fixture = Fixture::new();
    let strategy = RedirectionStrategy::direct_dispatch(&fixture.settings, &fixture.class);
    let code = compute(&fixture, &strategy);

    let mut machine = Machine::new(&fixture.class_graph);
    let alternate = fixture.install(&mut machine);
    let calls: Calls = Rc::new(RefCell::new(vec![]));
    let recorded = calls.clone();
    machine.define(
        "com/example/Calculator$override.compute(Lcom/example/Calculator;II)I",
        move |arguments| {
            let product = match (&arguments[2], &arguments[3]) {
                (Value::Int(a), Value::Int(b)) => a * b,
                _ => return Err(Trap::Malformed(String::from("expected ints"))),
            };
            recorded.borrow_mut().push(arguments);
            Ok(Some(Value::Int(product)))
        },
    );

    let receiver = fixture.receiver();
    let result = machine.run(&code, vec![receiver.clone(), Value::Int(2), Value::Int(3)]);
    assert_eq!(result, Ok(Some(Value::Int(6))));
    assert!(!machine.visited.contains(&original_body(&code)));

    // Called on the installed alternate, with the receiver and arguments unboxed
    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    match (&calls[0][0], &alternate) {
        (Value::Ref(called_on), Value::Ref(installed)) => assert!(Rc::ptr_eq(called_on, installed)),
        other => panic!("unexpected receiver {:?}", other),
    }
    assert_eq!(&calls[0][1..], &[receiver, Value::Int(2), Value::Int(3)]);
}

#[test]
fn direct_dispatch_rejects_foreign_alternate() {
    let fixture = Fixture::new();
    let strategy = RedirectionStrategy::direct_dispatch(&fixture.settings, &fixture.class);
    let code = compute(&fixture, &strategy);

    // Something that is not an override of `Calculator` sitting in `$change`
    let mut machine = Machine::new(&fixture.class_graph);
    machine.set_static(
        &change_field(&fixture.settings, &fixture.class),
        Value::string("not an override"),
    );
    let result = machine.run(&code, vec![fixture.receiver(), Value::Int(2), Value::Int(3)]);
    assert_eq!(
        result,
        Err(Trap::ClassCast {
            found: RefType::Object(BinaryName::STRING),
            expected: RefType::Object(fixture.settings.override_class(&fixture.class)),
        })
    );
}

#[test]
fn direct_dispatch_without_alternate() {
    let fixture = Fixture::new();
    let strategy = RedirectionStrategy::direct_dispatch(&fixture.settings, &fixture.class);
    let code = compute(&fixture, &strategy);

    // No override method is defined: reaching it would be a `MissingMethod` trap
    let mut machine = Machine::new(&fixture.class_graph);
    let result = machine.run(&code, vec![fixture.receiver(), Value::Int(2), Value::Int(3)]);
    assert_eq!(result, Ok(Some(Value::Int(5))));
}
