use crate::ram::ast::{Argument, ArgumentValue, Instruction, Label, OpCode, Scope};
use crate::ram::error::RamError;
use crate::ram::token::{Token, TokenKind, TokenValue};

/// Parse a token stream into a [`Scope`].
///
/// Label references are left unresolved; see [`crate::ram::labels`].
pub fn parse(tokens: &[Token]) -> Result<Scope, RamError> {
    let mut scope = Scope::default();
    let mut position = 0;

    while let Some(token) = tokens.get(position) {
        position += 1;
        match token.kind {
            TokenKind::Label => {
                let name = token.text().unwrap_or_default().to_string();
                scope.labels.push(Label {
                    name,
                    instruction_address: scope.instructions.len() as u32,
                    span: token.span,
                });
            }
            TokenKind::OpCode => {
                let instruction = parse_instruction(token, tokens, &mut position)?;
                scope.instructions.push(instruction);
            }
            _ => {
                return Err(RamError::UnexpectedToken {
                    raw: token.raw.clone(),
                    span: token.span,
                });
            }
        }
    }

    tracing::debug!(
        instructions = scope.instructions.len(),
        labels = scope.labels.len(),
        "parsed RAM program"
    );
    Ok(scope)
}

fn parse_instruction(
    token: &Token,
    tokens: &[Token],
    position: &mut usize,
) -> Result<Instruction, RamError> {
    let TokenValue::OpCode(opcode) = token.value else {
        return Err(RamError::UnexpectedToken {
            raw: token.raw.clone(),
            span: token.span,
        });
    };

    if opcode == OpCode::End {
        return Ok(Instruction {
            opcode,
            argument: None,
            span: token.span,
        });
    }

    let argument_token = tokens.get(*position).ok_or(RamError::MissingArgument {
        opcode,
        span: token.span.end(),
    })?;
    *position += 1;
    let argument = parse_argument(opcode, argument_token)?;

    let valid = match opcode {
        opcode if opcode.is_jump() => {
            matches!(argument.value, ArgumentValue::LabelReference { .. })
        }
        OpCode::Store => matches!(
            argument.value,
            ArgumentValue::Address(_) | ArgumentValue::AddressPointer(_)
        ),
        _ => !matches!(argument.value, ArgumentValue::LabelReference { .. }),
    };
    if !valid {
        return Err(RamError::InvalidArgument {
            opcode,
            argument: argument_token.raw.clone(),
            span: argument_token.span,
        });
    }

    Ok(Instruction {
        opcode,
        argument: Some(argument),
        span: token.span,
    })
}

fn parse_argument(opcode: OpCode, token: &Token) -> Result<Argument, RamError> {
    let value = match (token.kind, &token.value) {
        (TokenKind::Immediate, TokenValue::Number(value)) => ArgumentValue::Immediate(*value),
        (TokenKind::Address, TokenValue::Number(value)) => ArgumentValue::Address(*value),
        (TokenKind::AddressPointer, TokenValue::Number(value)) => {
            ArgumentValue::AddressPointer(*value)
        }
        (TokenKind::LabelReference, TokenValue::Text(name)) => ArgumentValue::LabelReference {
            name: name.clone(),
            label: None,
        },
        _ => {
            return Err(RamError::InvalidArgument {
                opcode,
                argument: token.raw.clone(),
                span: token.span,
            });
        }
    };
    Ok(Argument {
        value,
        span: token.span,
    })
}
