use hotpatch::jvm::class_graph::{ClassData, MethodData};
use hotpatch::jvm::code::{BranchInstruction, CodeBuilder, Instruction};
use hotpatch::jvm::{
    BinaryName, ClassAccessFlags, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
    RenderDescriptor, UnqualifiedName,
};
use hotpatch::redirect::{self, instrument, RedirectionStrategy, Settings};
use hotpatch::*;

use clap::{Arg, ArgAction, Command};

fn main() -> Result<(), redirect::Error> {
    env_logger::init();

    let matches = Command::new("JVM method hot-swap preview")
        .version("0.1.0")
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Show the redirection prologue inserted at the start of an instrumented method")
        .arg(
            Arg::new("class")
                .long("class")
                .value_name("CLASS_NAME")
                .required(true)
                .help("Class declaring the method (eg. `com/example/Calculator`)"),
        )
        .arg(
            Arg::new("name")
                .long("name")
                .required(true)
                .help("Method name (eg. `compute`)"),
        )
        .arg(
            Arg::new("descriptor")
                .long("descriptor")
                .required(true)
                .help("Method descriptor (eg. `(II)I`)"),
        )
        .arg(
            Arg::new("static")
                .long("static")
                .action(ArgAction::SetTrue)
                .help("The method is static"),
        )
        .arg(
            Arg::new("strategy")
                .long("strategy")
                .value_parser(["array", "direct"])
                .default_value("array")
                .help("Call the alternate through the generic dispatcher, or a static override"),
        )
        .arg(
            Arg::new("change-interface")
                .long("change-interface")
                .value_name("CLASS_NAME")
                .help("Interface implemented by alternate implementations"),
        )
        .arg(
            Arg::new("override-suffix")
                .long("override-suffix")
                .help("Suffix of the class holding static overrides"),
        )
        .get_matches();

    let mut settings = match matches.get_one::<String>("change-interface") {
        Some(change_interface) => Settings::with_change_interface(change_interface.clone())?,
        None => Settings::new()?,
    };
    if let Some(suffix) = matches.get_one::<String>("override-suffix") {
        settings.override_suffix =
            UnqualifiedName::from_string(suffix.clone()).map_err(redirect::Error::MalformedName)?;
    }

    let class = required(&matches, "class")?;
    let class = BinaryName::from_string(class).map_err(redirect::Error::MalformedName)?;
    let name = required(&matches, "name")?;
    let name = UnqualifiedName::from_string(name).map_err(redirect::Error::MalformedName)?;
    let descriptor = required(&matches, "descriptor")?;
    let descriptor = MethodDescriptor::parse(&descriptor)
        .map_err(|err| redirect::Error::BytecodeGen(jvm::Error::MalformedDescriptor(err)))?;

    let mut access_flags = MethodAccessFlags::PUBLIC;
    if matches.get_flag("static") {
        access_flags |= MethodAccessFlags::STATIC;
    }
    let method = MethodData {
        class: class.clone(),
        name,
        descriptor,
        access_flags,
    };

    let strategy = match matches.get_one::<String>("strategy").map(String::as_str) {
        Some("direct") => RedirectionStrategy::direct_dispatch(&settings, &class),
        _ => RedirectionStrategy::array_dispatch(&settings),
    };

    let mut class_graph = jvm::ClassGraph::new();
    class_graph.insert_java_library_types();
    class_graph.add_class(ClassData::new(
        class.clone(),
        BinaryName::OBJECT,
        ClassAccessFlags::PUBLIC,
    ));
    instrument::register_runtime_types(&mut class_graph, &settings, &class);

    log::info!("Instrumenting {:?}", method);
    let mut code = CodeBuilder::new(&class_graph, method);
    let spec = instrument::instrument_entry(&mut code, &settings, &strategy)?;

    // Placeholder for the original body
    code.push_instruction(Instruction::AConstNull)?;
    code.push_branch_instruction(BranchInstruction::AThrow)?;
    let code = code.result()?;

    println!("method key: {}", spec.method_key());
    println!(
        "redirected descriptor: {}",
        spec.redirected_descriptor().render()
    );
    println!();
    print!("{}", code);

    Ok(())
}

/// Clap enforces required arguments, so a missing one only shows up as a malformed name
fn required(matches: &clap::ArgMatches, id: &str) -> Result<String, redirect::Error> {
    matches
        .get_one::<String>(id)
        .cloned()
        .ok_or_else(|| redirect::Error::MalformedName(format!("missing --{}", id)))
}
