//! A minimal textual IR, parsed into a `parcoach_ir::Module`.
//!
//! `parcoach-ir` has no textual format of its own — its own test suite
//! builds `Function`s directly through `FunctionBuilder`. Reading real
//! input files from the command line still needs *some* surface syntax,
//! so this module defines the smallest one that can name every
//! instruction kind `parcoach-ir` has, and parses it in the same
//! two-pass shape a `.clif`-style reader uses: first collect every
//! function's name and signature (so forward calls resolve), then parse
//! bodies.
//!
//! ```text
//! extern fn MPI_Comm_rank(ptr, ptr)
//! extern fn MPI_Barrier(ptr)
//!
//! fn main(ptr) {
//! block0:
//!   v0 = const 0
//!   v1 = call MPI_Comm_rank(p0, v0)
//!   v2 = cmp eq v1, v0
//!   branch v2, block1, block2
//! block1:
//!   call MPI_Barrier(p0)
//!   jump block3
//! block2:
//!   jump block3
//! block3:
//!   return
//! }
//! ```
//!
//! Parameters are named `p0`, `p1`, ... in declaration order; every
//! other value is introduced by the instruction that defines it and
//! referenced by whatever name that instruction used, so `v7`, `tmp`,
//! and `rank` are all valid value names as long as they're consistent.

use parcoach_ir::builder::FunctionBuilder;
use parcoach_ir::{BinOp, CmpOp, Function, Module};
use std::collections::HashMap;
use std::fmt;

/// A 1-based source line, for diagnostics. Line 0 is reserved for
/// whole-file errors that don't point at one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
}

#[derive(Debug)]
pub struct ParseError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.location.line == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "line {}: {}", self.location.line, self.message)
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

fn err<T>(line: usize, message: impl Into<String>) -> ParseResult<T> {
    Err(ParseError { location: Location { line }, message: message.into() })
}

/// Parse a whole module from source text.
pub fn parse_module(src: &str) -> ParseResult<Module> {
    let lines: Vec<(usize, &str)> = src
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, strip_comment(l).trim()))
        .filter(|(_, l)| !l.is_empty())
        .collect();

    // Pass 1: collect every declaration and definition signature, so a
    // call to a function defined later in the file still resolves.
    let mut module = Module::new();
    let mut sig_params: HashMap<String, Vec<bool>> = HashMap::new();
    let mut i = 0;
    while i < lines.len() {
        let (lineno, line) = lines[i];
        if let Some(rest) = line.strip_prefix("extern fn ") {
            let (name, params, _) = parse_signature(lineno, rest)?;
            sig_params.insert(name.clone(), params.clone());
            let mut f = Function::new(name);
            f.pointer_params = params;
            module.declare_function(f);
            i += 1;
        } else if let Some(rest) = line.strip_prefix("fn ") {
            let (name, params, _) = parse_signature(lineno, rest)?;
            sig_params.insert(name.clone(), params.clone());
            let mut f = Function::new(name);
            f.pointer_params = params;
            module.declare_function(f);
            // Skip to the matching closing brace; pass 2 re-parses the body.
            while i < lines.len() && lines[i].1 != "}" {
                i += 1;
            }
            i += 1;
        } else {
            return err(lineno, format!("expected `fn` or `extern fn`, found `{line}`"));
        }
    }

    // Pass 2: parse bodies, now that every name in `module` resolves.
    let mut i = 0;
    while i < lines.len() {
        let (lineno, line) = lines[i];
        if line.strip_prefix("extern fn ").is_some() {
            i += 1;
            continue;
        }
        let rest = line.strip_prefix("fn ").expect("pass 1 validated this line");
        let (name, params, _) = parse_signature(lineno, rest)?;
        let id = module.func_id_by_name(&name).expect("declared in pass 1");
        let mut body_end = i + 1;
        while body_end < lines.len() && lines[body_end].1 != "}" {
            body_end += 1;
        }
        let body = &lines[i + 1..body_end];
        let func = parse_function_body(&name, &params, body, &module)?;
        *module.func_mut(id) = func;
        i = body_end + 1;
    }

    Ok(module)
}

/// `NAME(ptr, val, ...)` or `NAME(ptr, val, ...) {` (the trailing `{` is
/// stripped by the caller before this is called for `fn`, but tolerated
/// here too).
fn parse_signature(lineno: usize, rest: &str) -> ParseResult<(String, Vec<bool>, ())> {
    let rest = rest.trim_end_matches('{').trim();
    let open = rest.find('(').ok_or_else(|| ParseError {
        location: Location { line: lineno },
        message: "expected `(` after function name".into(),
    })?;
    let close = rest.rfind(')').ok_or_else(|| ParseError {
        location: Location { line: lineno },
        message: "expected `)` closing parameter list".into(),
    })?;
    let name = rest[..open].trim().to_string();
    if name.is_empty() {
        return err(lineno, "function name must not be empty");
    }
    let arg_list = rest[open + 1..close].trim();
    let params = if arg_list.is_empty() {
        Vec::new()
    } else {
        arg_list
            .split(',')
            .map(|p| match p.trim() {
                "ptr" => Ok(true),
                "val" => Ok(false),
                other => err(lineno, format!("expected `ptr` or `val`, found `{other}`")),
            })
            .collect::<ParseResult<Vec<bool>>>()?
    };
    Ok((name, params, ()))
}

fn parse_function_body(
    name: &str,
    params: &[bool],
    body: &[(usize, &str)],
    module: &Module,
) -> ParseResult<Function> {
    let mut b = FunctionBuilder::new(name);

    // First sweep: create every labeled block, in order of first
    // appearance, so forward jump/branch targets resolve.
    let mut block_names = Vec::new();
    for &(_, line) in body {
        if let Some(label) = line.strip_suffix(':') {
            if !block_names.contains(&label.to_string()) {
                block_names.push(label.to_string());
            }
        }
    }
    if block_names.is_empty() {
        return err(0, format!("function `{name}` has no blocks"));
    }
    let blocks: HashMap<String, parcoach_ir::Block> =
        block_names.iter().map(|n| (n.clone(), b.create_block())).collect();

    let entry = blocks[&block_names[0]];
    let mut values: HashMap<String, parcoach_ir::Value> = HashMap::new();
    for (i, &is_ptr) in params.iter().enumerate() {
        let _ = is_ptr;
        let v = b.append_block_param(entry);
        values.insert(format!("p{i}"), v);
    }

    let mut current_label: Option<&str> = None;
    for &(lineno, line) in body {
        if let Some(label) = line.strip_suffix(':') {
            current_label = Some(label);
            b.switch_to_block(blocks[label]);
            continue;
        }
        if current_label.is_none() {
            return err(lineno, "instruction before any block label");
        }
        parse_instruction(lineno, line, &mut b, &mut values, &blocks, module)?;
    }

    let mut func = b.finish();
    func.pointer_params = params.to_vec();
    Ok(func)
}

fn parse_instruction(
    lineno: usize,
    line: &str,
    b: &mut FunctionBuilder,
    values: &mut HashMap<String, parcoach_ir::Value>,
    blocks: &HashMap<String, parcoach_ir::Block>,
    module: &Module,
) -> ParseResult<()> {
    let (dst, rhs) = match line.split_once('=') {
        Some((d, r)) => (Some(d.trim()), r.trim()),
        None => (None, line),
    };

    let mut parts = rhs.splitn(2, char::is_whitespace);
    let op = parts.next().unwrap_or_default();
    let operand_str = parts.next().unwrap_or_default().trim();

    let value_of = |values: &HashMap<String, parcoach_ir::Value>, name: &str| {
        values.get(name).copied().ok_or_else(|| ParseError {
            location: Location { line: lineno },
            message: format!("undefined value `{name}`"),
        })
    };
    let block_of = |name: &str| {
        blocks.get(name).copied().ok_or_else(|| ParseError {
            location: Location { line: lineno },
            message: format!("undefined block `{name}`"),
        })
    };
    let args = |s: &str| -> Vec<String> {
        if s.trim().is_empty() {
            Vec::new()
        } else {
            s.split(',').map(|a| a.trim().to_string()).collect()
        }
    };

    match op {
        "const" => {
            let n: i64 = operand_str
                .parse()
                .map_err(|_| ParseError { location: Location { line: lineno }, message: format!("invalid integer `{operand_str}`") })?;
            let v = b.ins_const(n);
            values.insert(dst.expect("const has a result").to_string(), v);
        }
        "binary" | "cmp" => {
            let mut it = operand_str.splitn(2, char::is_whitespace);
            let kind = it.next().unwrap_or_default();
            let rest = it.next().unwrap_or_default();
            let operands = args(rest);
            if operands.len() != 2 {
                return err(lineno, format!("`{op}` expects two operands, found {}", operands.len()));
            }
            let lhs = value_of(values, &operands[0])?;
            let rhs = value_of(values, &operands[1])?;
            let v = if op == "binary" {
                let binop = parse_binop(lineno, kind)?;
                b.ins_binary(binop, lhs, rhs)
            } else {
                let cmpop = parse_cmpop(lineno, kind)?;
                b.ins_cmp(cmpop, lhs, rhs)
            };
            values.insert(dst.expect("binary/cmp has a result").to_string(), v);
        }
        "load" => {
            let ptr = value_of(values, operand_str)?;
            let v = b.ins_load(ptr);
            values.insert(dst.expect("load has a result").to_string(), v);
        }
        "store" => {
            let operands = args(operand_str);
            if operands.len() != 2 {
                return err(lineno, "`store` expects `ptr, value`");
            }
            let ptr = value_of(values, &operands[0])?;
            let val = value_of(values, &operands[1])?;
            b.ins_store(ptr, val);
        }
        "call" => {
            let open = operand_str.find('(').ok_or_else(|| ParseError {
                location: Location { line: lineno },
                message: "expected `(` in call".into(),
            })?;
            let callee_name = operand_str[..open].trim();
            let close = operand_str.rfind(')').ok_or_else(|| ParseError {
                location: Location { line: lineno },
                message: "expected `)` closing call arguments".into(),
            })?;
            let callee = module.func_id_by_name(callee_name).ok_or_else(|| ParseError {
                location: Location { line: lineno },
                message: format!("call to undeclared function `{callee_name}`"),
            })?;
            let arg_names = args(&operand_str[open + 1..close]);
            let mut resolved = Vec::with_capacity(arg_names.len());
            for a in &arg_names {
                resolved.push(value_of(values, a)?);
            }
            match dst {
                Some(name) => {
                    let v = b.ins_call(callee, resolved);
                    values.insert(name.to_string(), v);
                }
                None => b.ins_call_void(callee, resolved),
            }
        }
        "jump" => {
            let target = block_of(operand_str)?;
            b.ins_jump(target);
        }
        "branch" => {
            let operands = args(operand_str);
            if operands.len() != 3 {
                return err(lineno, "`branch` expects `cond, then_block, else_block`");
            }
            let cond = value_of(values, &operands[0])?;
            let then_block = block_of(&operands[1])?;
            let else_block = block_of(&operands[2])?;
            b.ins_branch(cond, then_block, else_block);
        }
        "return" => {
            let operands = args(operand_str);
            let mut resolved = Vec::with_capacity(operands.len());
            for o in &operands {
                resolved.push(value_of(values, o)?);
            }
            b.ins_return(resolved);
        }
        other => return err(lineno, format!("unknown instruction `{other}`")),
    }

    Ok(())
}

fn parse_binop(lineno: usize, s: &str) -> ParseResult<BinOp> {
    Ok(match s {
        "add" => BinOp::Add,
        "sub" => BinOp::Sub,
        "mul" => BinOp::Mul,
        "sdiv" => BinOp::SDiv,
        "udiv" => BinOp::UDiv,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        "xor" => BinOp::Xor,
        "shl" => BinOp::Shl,
        "shr" => BinOp::Shr,
        other => return err(lineno, format!("unknown binary operator `{other}`")),
    })
}

fn parse_cmpop(lineno: usize, s: &str) -> ParseResult<CmpOp> {
    Ok(match s {
        "eq" => CmpOp::Eq,
        "ne" => CmpOp::Ne,
        "lt" => CmpOp::Lt,
        "le" => CmpOp::Le,
        "gt" => CmpOp::Gt,
        "ge" => CmpOp::Ge,
        other => return err(lineno, format!("unknown comparison `{other}`")),
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"
        extern fn MPI_Comm_rank(ptr, ptr)
        extern fn MPI_Barrier(ptr)

        fn main(ptr) {
        block0:
          v0 = const 0
          v1 = call MPI_Comm_rank(p0, v0)
          v2 = cmp eq v1, v0
          branch v2, block1, block2
        block1:
          call MPI_Barrier(p0)
          jump block3
        block2:
          jump block3
        block3:
          return
        }
    "#;

    #[test]
    fn parses_a_simple_module() {
        let module = parse_module(SRC).expect("parses");
        assert_eq!(module.len(), 3);
        let main = module.func_id_by_name("main").expect("declared");
        assert!(!module.func(main).is_declaration());
        assert_eq!(module.func(main).layout.num_blocks(), 4);
    }

    #[test]
    fn rejects_call_to_undeclared_function() {
        let src = "fn main() {\nblock0:\n  call Unknown()\n  return\n}\n";
        assert!(parse_module(src).is_err());
    }
}
