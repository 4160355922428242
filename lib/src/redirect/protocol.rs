use super::boxing::adapt_return;
use super::{Error, RedirectionSpec, RedirectionStrategy};
use crate::jvm::code::{BranchInstruction, CodeBuilder, CodeBuilderExts, EqComparison, Instruction};
use crate::jvm::RenderDescriptor;

/// Emit the redirection prologue at the position recorded in `spec`
///
/// The emitted code behaves like
///
/// ```text
/// if (alternate != null) {
///     return adapt(dispatch(alternate, arguments...));
/// }
/// original body...
/// ```
///
/// with the builder left at the start of the original body. Before anything is emitted, the
/// builder must be sitting exactly at that position and must be building the method described
/// by `spec`.
pub fn emit_redirection(
    spec: &RedirectionSpec,
    strategy: &RedirectionStrategy,
    code: &mut CodeBuilder,
    alternate_local: u16,
) -> Result<(), Error> {
    let position = spec.position();
    if position.stream != code.stream() {
        return Err(Error::ForeignPosition(position));
    }
    if !code.is_at(&position) {
        return Err(Error::NotAtPosition(position));
    }
    let method = &code.method;
    if &method.class != spec.declaring_type()
        || &method.name != spec.method_name()
        || &method.descriptor != spec.original_descriptor()
        || method.is_static() != spec.is_static()
    {
        return Err(Error::MethodMismatch {
            expected: format!(
                "{}{}.{}{}",
                if spec.is_static() { "static " } else { "" },
                spec.declaring_type(),
                spec.method_name(),
                spec.original_descriptor().render()
            ),
            found: format!(
                "{}{:?}",
                if method.is_static() { "static " } else { "" },
                method
            ),
        });
    }

    log::debug!(
        "Redirecting {}.{} through {:?}",
        spec.declaring_type(),
        spec.method_key(),
        strategy
    );

    let skip = code.fresh_label();
    code.push_instruction(Instruction::ALoad(alternate_local))?;
    code.push_branch_instruction(BranchInstruction::IfNull(EqComparison::EQ, skip, ()))?;

    let raw = strategy.emit_dispatch(spec, code, alternate_local)?;
    adapt_return(code, &raw, spec.return_type())?;
    code.return_(spec.return_type())?;

    code.place_label(skip)?;
    Ok(())
}
