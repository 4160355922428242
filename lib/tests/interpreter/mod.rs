//! Tiny interpreter for the code produced by `CodeBuilder`
//!
//! Only what instrumented methods need is modelled: primitives, boxes, strings, opaque instances,
//! and `Object[]` arrays. Calls to `valueOf` and the `xxxValue` accessors of the wrapper classes
//! are built in; every other call goes to a host method registered on the machine.

use hotpatch::jvm::class_graph::{ClassGraph, FieldData, MethodData};
use hotpatch::jvm::code::{
    BranchInstruction, Code, ConstantData, EqComparison, Instruction, OrdComparison, SynLabel,
};
use hotpatch::jvm::{BaseType, BinaryName, FieldType, RefType, UnqualifiedName};
use hotpatch::redirect::boxing::boxed_class;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(Rc<Object>),
}

#[derive(Debug, PartialEq)]
pub enum Object {
    Boxed(BaseType, Value),
    String(String),
    Instance(BinaryName),
    Array(RefType<BinaryName>, RefCell<Vec<Value>>),
}

impl Object {
    pub fn runtime_type(&self) -> RefType<BinaryName> {
        match self {
            Object::Boxed(base_type, _) => RefType::Object(boxed_class(*base_type)),
            Object::String(_) => RefType::Object(BinaryName::STRING),
            Object::Instance(class) => RefType::Object(class.clone()),
            Object::Array(element, _) => RefType::array(FieldType::Ref(element.clone())),
        }
    }
}

impl Value {
    pub fn boxed(base_type: BaseType, value: Value) -> Value {
        Value::Ref(Rc::new(Object::Boxed(base_type, value)))
    }

    pub fn string(string: impl Into<String>) -> Value {
        Value::Ref(Rc::new(Object::String(string.into())))
    }

    pub fn instance(class: BinaryName) -> Value {
        Value::Ref(Rc::new(Object::Instance(class)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ref(object) => match object.as_ref() {
                Object::String(string) => Some(string),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn array_elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Ref(object) => match object.as_ref() {
                Object::Array(_, elements) => Some(elements.borrow().clone()),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn default_for(field_type: &FieldType<BinaryName>) -> Value {
        match field_type {
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            FieldType::Base(_) => Value::Int(0),
            FieldType::Ref(_) => Value::Null,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Trap {
    NullPointer,
    ClassCast {
        found: RefType<BinaryName>,
        expected: RefType<BinaryName>,
    },
    Thrown(Value),
    MissingMethod(String),
    Malformed(String),
}

pub type HostMethod = Box<dyn FnMut(Vec<Value>) -> Result<Option<Value>, Trap>>;

pub struct Machine<'g> {
    class_graph: &'g ClassGraph,
    statics: HashMap<String, Value>,
    host_methods: HashMap<String, HostMethod>,

    /// Labels of the blocks entered, in order
    pub visited: Vec<SynLabel>,

    /// Operand stack depth left behind when the method returned
    pub stack_at_exit: usize,
}

impl<'g> Machine<'g> {
    pub fn new(class_graph: &'g ClassGraph) -> Machine<'g> {
        Machine {
            class_graph,
            statics: HashMap::new(),
            host_methods: HashMap::new(),
            visited: vec![],
            stack_at_exit: 0,
        }
    }

    /// Register a host method, keyed by its rendered form (`some/Class.name(I)V`)
    pub fn define(
        &mut self,
        method: &str,
        body: impl FnMut(Vec<Value>) -> Result<Option<Value>, Trap> + 'static,
    ) {
        self.host_methods.insert(String::from(method), Box::new(body));
    }

    pub fn set_static(&mut self, field: &FieldData, value: Value) {
        self.statics
            .insert(format!("{}.{}", field.class, field.name), value);
    }

    /// Run code to completion with the given arguments (receiver first, if any)
    pub fn run(&mut self, code: &Code, arguments: Vec<Value>) -> Result<Option<Value>, Trap> {
        let mut locals: Vec<Option<Value>> = vec![None; code.max_locals.0];
        let mut slot = 0;
        for argument in arguments {
            let width = if argument.is_wide() { 2 } else { 1 };
            store(&mut locals, slot, argument);
            slot += width;
        }

        let mut stack: Vec<Value> = vec![];
        let mut label = *code
            .block_order
            .first()
            .ok_or_else(|| Trap::Malformed(String::from("no blocks")))?;

        loop {
            self.visited.push(label);
            let block = code
                .blocks
                .get(&label)
                .ok_or_else(|| Trap::Malformed(format!("missing block {:?}", label)))?;

            for insn in &block.instructions {
                self.step(insn, &mut stack, &mut locals)?;
            }

            label = match &block.branch_end {
                BranchInstruction::If(op, target, next) => {
                    let value = pop_int(&mut stack)?;
                    if compare(*op, value, 0) {
                        *target
                    } else {
                        *next
                    }
                }
                BranchInstruction::IfICmp(op, target, next) => {
                    let rhs = pop_int(&mut stack)?;
                    let lhs = pop_int(&mut stack)?;
                    if compare(*op, lhs, rhs) {
                        *target
                    } else {
                        *next
                    }
                }
                BranchInstruction::IfACmp(op, target, next) => {
                    let rhs = pop(&mut stack)?;
                    let lhs = pop(&mut stack)?;
                    let same = match (&lhs, &rhs) {
                        (Value::Null, Value::Null) => true,
                        (Value::Ref(l), Value::Ref(r)) => Rc::ptr_eq(l, r),
                        _ => false,
                    };
                    if same == (*op == EqComparison::EQ) {
                        *target
                    } else {
                        *next
                    }
                }
                BranchInstruction::IfNull(op, target, next) => {
                    let is_null = matches!(pop(&mut stack)?, Value::Null);
                    if is_null == (*op == EqComparison::EQ) {
                        *target
                    } else {
                        *next
                    }
                }
                BranchInstruction::Goto(target) => *target,
                BranchInstruction::FallThrough(next) => *next,
                BranchInstruction::IReturn
                | BranchInstruction::LReturn
                | BranchInstruction::FReturn
                | BranchInstruction::DReturn
                | BranchInstruction::AReturn => {
                    let value = pop(&mut stack)?;
                    self.stack_at_exit = stack.len();
                    return Ok(Some(value));
                }
                BranchInstruction::Return => {
                    self.stack_at_exit = stack.len();
                    return Ok(None);
                }
                BranchInstruction::AThrow => return Err(Trap::Thrown(pop(&mut stack)?)),
            };
        }
    }

    fn step(
        &mut self,
        insn: &Instruction,
        stack: &mut Vec<Value>,
        locals: &mut Vec<Option<Value>>,
    ) -> Result<(), Trap> {
        use Instruction::*;

        match insn {
            Nop => (),
            AConstNull => stack.push(Value::Null),
            IConstM1 => stack.push(Value::Int(-1)),
            IConst0 => stack.push(Value::Int(0)),
            IConst1 => stack.push(Value::Int(1)),
            IConst2 => stack.push(Value::Int(2)),
            IConst3 => stack.push(Value::Int(3)),
            IConst4 => stack.push(Value::Int(4)),
            IConst5 => stack.push(Value::Int(5)),
            LConst0 => stack.push(Value::Long(0)),
            LConst1 => stack.push(Value::Long(1)),
            FConst0 => stack.push(Value::Float(0.0)),
            FConst1 => stack.push(Value::Float(1.0)),
            FConst2 => stack.push(Value::Float(2.0)),
            DConst0 => stack.push(Value::Double(0.0)),
            DConst1 => stack.push(Value::Double(1.0)),
            BiPush(value) => stack.push(Value::Int(*value as i32)),
            SiPush(value) => stack.push(Value::Int(*value as i32)),
            Ldc(constant) | Ldc2(constant) => stack.push(match constant {
                ConstantData::String(string) => Value::string(string.to_string()),
                ConstantData::Integer(integer) => Value::Int(*integer),
                ConstantData::Float(float) => Value::Float(*float),
                ConstantData::Long(long) => Value::Long(*long),
                ConstantData::Double(double) => Value::Double(*double),
                ConstantData::Class(_) => {
                    return Err(Trap::Malformed(String::from("class constants")))
                }
            }),
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) => {
                let value = locals
                    .get(*idx as usize)
                    .cloned()
                    .flatten()
                    .ok_or_else(|| Trap::Malformed(format!("uninitialized local {}", idx)))?;
                stack.push(value);
            }
            IStore(idx) | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => {
                let value = pop(stack)?;
                store(locals, *idx as usize, value);
            }
            AALoad => {
                let index = pop_int(stack)?;
                let array = pop(stack)?;
                let elements = array.array_elements().ok_or(Trap::NullPointer)?;
                let element = elements
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| Trap::Malformed(format!("index {} out of bounds", index)))?;
                stack.push(element);
            }
            AAStore => {
                let value = pop(stack)?;
                let index = pop_int(stack)?;
                match pop(stack)? {
                    Value::Ref(object) => match object.as_ref() {
                        Object::Array(_, elements) => {
                            let mut elements = elements.borrow_mut();
                            let slot = elements.get_mut(index as usize).ok_or_else(|| {
                                Trap::Malformed(format!("index {} out of bounds", index))
                            })?;
                            *slot = value;
                        }
                        _ => return Err(Trap::Malformed(String::from("aastore on non-array"))),
                    },
                    _ => return Err(Trap::NullPointer),
                }
            }
            Pop => {
                pop(stack)?;
            }
            Pop2 => {
                if !pop(stack)?.is_wide() {
                    pop(stack)?;
                }
            }
            Dup => {
                let top = stack
                    .last()
                    .cloned()
                    .ok_or_else(|| Trap::Malformed(String::from("dup on empty stack")))?;
                stack.push(top);
            }
            Swap => {
                let top = pop(stack)?;
                let below = pop(stack)?;
                stack.push(top);
                stack.push(below);
            }
            IAdd | ISub | IMul => {
                let rhs = pop_int(stack)?;
                let lhs = pop_int(stack)?;
                stack.push(Value::Int(match insn {
                    IAdd => lhs.wrapping_add(rhs),
                    ISub => lhs.wrapping_sub(rhs),
                    _ => lhs.wrapping_mul(rhs),
                }));
            }
            LAdd | LSub | LMul => match (pop(stack)?, pop(stack)?) {
                (Value::Long(rhs), Value::Long(lhs)) => stack.push(Value::Long(match insn {
                    LAdd => lhs.wrapping_add(rhs),
                    LSub => lhs.wrapping_sub(rhs),
                    _ => lhs.wrapping_mul(rhs),
                })),
                _ => return Err(Trap::Malformed(format!("{} on non-longs", insn))),
            },
            FAdd => match (pop(stack)?, pop(stack)?) {
                (Value::Float(rhs), Value::Float(lhs)) => stack.push(Value::Float(lhs + rhs)),
                _ => return Err(Trap::Malformed(String::from("fadd on non-floats"))),
            },
            DAdd => match (pop(stack)?, pop(stack)?) {
                (Value::Double(rhs), Value::Double(lhs)) => stack.push(Value::Double(lhs + rhs)),
                _ => return Err(Trap::Malformed(String::from("dadd on non-doubles"))),
            },
            INeg => {
                let value = pop_int(stack)?;
                stack.push(Value::Int(value.wrapping_neg()));
            }
            I2L => {
                let value = pop_int(stack)?;
                stack.push(Value::Long(value as i64));
            }
            I2F => {
                let value = pop_int(stack)?;
                stack.push(Value::Float(value as f32));
            }
            I2D => {
                let value = pop_int(stack)?;
                stack.push(Value::Double(value as f64));
            }
            L2I => match pop(stack)? {
                Value::Long(value) => stack.push(Value::Int(value as i32)),
                _ => return Err(Trap::Malformed(String::from("l2i on non-long"))),
            },
            GetStatic(field) => {
                let value = self
                    .statics
                    .get(&format!("{}.{}", field.class, field.name))
                    .cloned()
                    .unwrap_or_else(|| Value::default_for(&field.descriptor));
                stack.push(value);
            }
            PutStatic(field) => {
                let value = pop(stack)?;
                self.set_static(field, value);
            }
            GetField(_) | PutField(_) => {
                return Err(Trap::Malformed(String::from("instance fields")))
            }
            Invoke(_, method) => {
                let mut arguments = vec![];
                for _ in &method.descriptor.parameters {
                    arguments.push(pop(stack)?);
                }
                if !method.is_static() {
                    arguments.push(pop(stack)?);
                }
                arguments.reverse();
                if let Some(value) = self.invoke(method, arguments)? {
                    stack.push(value);
                }
            }
            ANewArray(element) => {
                let length = pop_int(stack)?;
                if length < 0 {
                    return Err(Trap::Malformed(format!("negative array size {}", length)));
                }
                let elements = vec![Value::Null; length as usize];
                stack.push(Value::Ref(Rc::new(Object::Array(
                    element.clone(),
                    RefCell::new(elements),
                ))));
            }
            ArrayLength => {
                let elements = pop(stack)?.array_elements().ok_or(Trap::NullPointer)?;
                stack.push(Value::Int(elements.len() as i32));
            }
            CheckCast(expected) => match stack.last() {
                Some(Value::Ref(object)) => {
                    let found = object.runtime_type();
                    if !self.class_graph.is_java_assignable(&found, expected) {
                        return Err(Trap::ClassCast {
                            found,
                            expected: expected.clone(),
                        });
                    }
                }
                Some(Value::Null) => (),
                _ => return Err(Trap::Malformed(String::from("checkcast on non-reference"))),
            },
            InstanceOf(expected) => {
                let matches = match pop(stack)? {
                    Value::Ref(object) => self
                        .class_graph
                        .is_java_assignable(&object.runtime_type(), expected),
                    _ => false,
                };
                stack.push(Value::Int(matches as i32));
            }
        }
        Ok(())
    }

    fn invoke(&mut self, method: &MethodData, arguments: Vec<Value>) -> Result<Option<Value>, Trap> {
        if !method.is_static() && arguments.first() == Some(&Value::Null) {
            return Err(Trap::NullPointer);
        }

        // Wrapper factories
        if method.is_static() && method.name == UnqualifiedName::VALUEOF {
            if let [FieldType::Base(base_type)] = method.descriptor.parameters.as_slice() {
                if method.class == boxed_class(*base_type) {
                    let value = arguments.into_iter().next().ok_or(Trap::NullPointer)?;
                    return Ok(Some(Value::boxed(*base_type, value)));
                }
            }
        }

        // Wrapper accessors
        if let (Some(Value::Ref(receiver)), Some(FieldType::Base(target))) =
            (arguments.first(), &method.descriptor.return_type)
        {
            if let Object::Boxed(_, value) = receiver.as_ref() {
                if method.descriptor.parameters.is_empty() {
                    return convert(value, *target).map(Some);
                }
            }
        }

        let key = format!("{:?}", method);
        match self.host_methods.get_mut(&key) {
            Some(body) => body(arguments),
            None => Err(Trap::MissingMethod(key)),
        }
    }
}

fn store(locals: &mut Vec<Option<Value>>, slot: usize, value: Value) {
    if locals.len() <= slot {
        locals.resize(slot + 1, None);
    }
    locals[slot] = Some(value);
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, Trap> {
    stack
        .pop()
        .ok_or_else(|| Trap::Malformed(String::from("stack underflow")))
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i32, Trap> {
    match pop(stack)? {
        Value::Int(integer) => Ok(integer),
        other => Err(Trap::Malformed(format!("expected int, found {:?}", other))),
    }
}

fn compare(op: OrdComparison, lhs: i32, rhs: i32) -> bool {
    match op {
        OrdComparison::EQ => lhs == rhs,
        OrdComparison::NE => lhs != rhs,
        OrdComparison::LT => lhs < rhs,
        OrdComparison::LE => lhs <= rhs,
        OrdComparison::GT => lhs > rhs,
        OrdComparison::GE => lhs >= rhs,
    }
}

/// Primitive conversion, as done by `Number.xxxValue()`
fn convert(value: &Value, target: BaseType) -> Result<Value, Trap> {
    let (integral, floating) = match value {
        Value::Int(i) => (*i as i64, *i as f64),
        Value::Long(l) => (*l, *l as f64),
        Value::Float(f) => (*f as i64, *f as f64),
        Value::Double(d) => (*d as i64, *d),
        other => return Err(Trap::Malformed(format!("boxed {:?}", other))),
    };
    Ok(match target {
        BaseType::Boolean | BaseType::Int => Value::Int(integral as i32),
        BaseType::Byte => Value::Int(integral as i8 as i32),
        BaseType::Short => Value::Int(integral as i16 as i32),
        BaseType::Char => Value::Int(integral as u16 as i32),
        BaseType::Long => Value::Long(integral),
        BaseType::Float => Value::Float(floating as f32),
        BaseType::Double => Value::Double(floating),
    })
}
