//! Printer for the textual form.
//!
//! Function arguments print as `%argN`; every other value gets `%N` in
//! definition order. Operations with several results bind `%N:k` and their
//! results are referenced as `%N#i`.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::config::PrintOptions;
use crate::func::{Function, Module};
use crate::mixed::{MixedIndex, OffsetsSizesStrides};
use crate::op::{Op, Operation};
use crate::ops::LoopOp;
use crate::region::{Block, Region};
use crate::types::Type;
use crate::value::{Value, ValueId};

pub fn print_function(function: &Function) -> String {
    print_function_with(function, PrintOptions::default())
}

pub fn print_function_with(function: &Function, options: PrintOptions) -> String {
    let mut printer = Printer::new(options);
    // Writing into a String cannot fail.
    let _ = printer.function(function);
    printer.out
}

pub fn print_module(module: &Module) -> String {
    let mut printer = Printer::new(PrintOptions::default());
    for (position, function) in module.functions().iter().enumerate() {
        if position > 0 {
            printer.out.push('\n');
        }
        let _ = printer.function(function);
    }
    printer.out
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_function(self))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_module(self))
    }
}

struct Printer {
    options: PrintOptions,
    names: HashMap<ValueId, String>,
    next: usize,
    depth: usize,
    out: String,
}

impl Printer {
    fn new(options: PrintOptions) -> Self {
        Self { options, names: HashMap::new(), next: 0, depth: 0, out: String::new() }
    }

    // =========================================================================
    // Naming
    // =========================================================================

    fn fresh(&mut self) -> String {
        let name = format!("%{}", self.next);
        self.next += 1;
        name
    }

    fn define(&mut self, value: &Value) -> String {
        let name = self.fresh();
        self.names.insert(value.id(), name.clone());
        name
    }

    /// Name the results of `operation`, returning the binding prefix.
    fn define_results(&mut self, results: &[Value]) -> Option<String> {
        match results {
            [] => None,
            [single] => Some(self.define(single)),
            many => {
                let base = self.fresh();
                for (index, value) in many.iter().enumerate() {
                    self.names.insert(value.id(), format!("{base}#{index}"));
                }
                Some(format!("{base}:{}", many.len()))
            }
        }
    }

    fn name(&self, value: &Value) -> String {
        self.names.get(&value.id()).cloned().unwrap_or_else(|| format!("%{}", value.id()))
    }

    fn names(&self, values: &[Value]) -> String {
        values.iter().map(|v| self.name(v)).collect::<Vec<_>>().join(", ")
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn indent(&mut self) {
        let width = self.depth * self.options.indent;
        self.out.extend(std::iter::repeat_n(' ', width));
    }

    fn function(&mut self, function: &Function) -> fmt::Result {
        self.names.clear();
        self.next = 0;

        let mut args = Vec::new();
        for (index, arg) in function.arguments().iter().enumerate() {
            let name = format!("%arg{index}");
            self.names.insert(arg.id(), name.clone());
            args.push(format!("{name}: {}", arg.ty()));
        }
        write!(self.out, "func @{}({})", function.name(), args.join(", "))?;
        if !function.result_types().is_empty() {
            write!(self.out, " -> ({})", join_types(function.result_types().iter()))?;
        }
        self.block_body(function.body())?;
        self.out.push('\n');
        Ok(())
    }

    /// ` {` newline, operations, closing brace at the current depth.
    fn block_body(&mut self, block: &Block) -> fmt::Result {
        self.out.push_str(" {\n");
        self.depth += 1;
        for operation in block.operations() {
            self.operation(operation)?;
        }
        self.depth -= 1;
        self.indent();
        self.out.push('}');
        Ok(())
    }

    fn region_body(&mut self, region: &Region) -> fmt::Result {
        match region.entry() {
            Some(block) => self.block_body(block),
            None => {
                self.out.push_str(" {}");
                Ok(())
            }
        }
    }

    fn operation(&mut self, operation: &Operation) -> fmt::Result {
        self.indent();
        if let Some(binding) = self.define_results(operation.results()) {
            write!(self.out, "{binding} = ")?;
        }
        self.out.push_str(operation.name());

        let results = operation.results();
        match operation.op() {
            Op::Constant(value) => write!(self.out, " {value} : {}", results[0].ty())?,
            Op::Splat(value) => write!(self.out, " {} : {}", self.name(value), results[0].ty())?,
            Op::Binary(_, lhs, rhs) => {
                write!(self.out, " {}, {} : {}", self.name(lhs), self.name(rhs), results[0].ty())?;
            }
            Op::Tile(tile) => {
                let triple = self.triple(tile.triple());
                write!(self.out, " {triple} : {}", results[0].ty())?;
            }
            Op::Materialize(op) => {
                let triple = self.triple(op.triple());
                write!(self.out, " {} {triple} : {} to {}", self.name(op.source()), op.source().ty(), results[0].ty())?;
            }
            Op::Loop(op) => self.loop_op(op, results)?,
            Op::SetYield(op) => {
                let mut update_types = Vec::new();
                for update in 0..op.num_updates() {
                    let (src, dst, set) = (&op.srcs()[update], &op.dsts()[update], &op.sets()[update]);
                    self.out.push_str(if update == 0 { " " } else { ", " });
                    write!(self.out, "{} at {} into {}", self.name(src), self.name(set), self.name(dst))?;
                    if let Some(region) = op.accumulator_for(update) {
                        self.accumulator(region, src.ty())?;
                    }
                    update_types.push(format!("{} into {}[{}]", src.ty(), dst.ty(), set.ty()));
                }
                if !update_types.is_empty() {
                    write!(self.out, " : {}", update_types.join(", "))?;
                }
            }
            Op::Yield(op) => self.terminator_values(op.values())?,
            Op::Return(values) => self.terminator_values(values)?,
            Op::Fusion(op) => {
                let block_args = op.body().entry().map(Block::arguments).unwrap_or(&[]);
                let mut entries = Vec::new();
                for (arg, input) in block_args.iter().zip(op.inputs()) {
                    let name = self.define(arg);
                    entries.push(format!("{name} = {} : {}", self.name(input), input.ty()));
                }
                write!(self.out, " ({})", entries.join(", "))?;
                self.region_body(op.body())?;
                if !results.is_empty() {
                    write!(self.out, " : {}", join_types(results.iter().map(Value::ty)))?;
                }
            }
        }
        self.out.push('\n');
        Ok(())
    }

    fn loop_op(&mut self, op: &LoopOp, results: &[Value]) -> fmt::Result {
        let ivs: Vec<String> = op.induction_vars().iter().map(|iv| self.define(iv)).collect();
        write!(
            self.out,
            " ({}) = ({}) to ({}) step ({})",
            ivs.join(", "),
            self.names(op.lower()),
            self.names(op.upper()),
            self.names(op.step())
        )?;

        let mut outs = Vec::new();
        for (arg, init) in op.output_args().iter().zip(op.outputs()) {
            let name = self.define(arg);
            outs.push(format!("{name} = {} : {}", self.name(init), init.ty()));
        }
        write!(self.out, " outs ({})", outs.join(", "))?;
        if let Some(tag) = op.kind().distribution() {
            write!(self.out, " distribution \"{}\"", escape(tag))?;
        }
        self.region_body(op.body())?;
        if !results.is_empty() {
            write!(self.out, " : {}", join_types(results.iter().map(Value::ty)))?;
        }
        Ok(())
    }

    fn accumulator(&mut self, region: &Region, ty: &Type) -> fmt::Result {
        let args = region.entry().map(Block::arguments).unwrap_or(&[]);
        let names: Vec<String> = args.iter().map(|arg| self.define(arg)).collect();
        write!(self.out, " acc ({} : {ty})", names.join(", "))?;
        self.region_body(region)
    }

    fn terminator_values(&mut self, values: &[Value]) -> fmt::Result {
        if !values.is_empty() {
            write!(self.out, " {} : {}", self.names(values), join_types(values.iter().map(Value::ty)))?;
        }
        Ok(())
    }

    fn triple(&self, triple: &OffsetsSizesStrides) -> String {
        let list = |entries: &[MixedIndex]| {
            let items: Vec<String> = entries
                .iter()
                .map(|entry| match entry {
                    MixedIndex::Const(v) => v.to_string(),
                    MixedIndex::Dynamic(value) => self.name(value),
                })
                .collect();
            format!("[{}]", items.join(", "))
        };
        format!("{} {} {}", list(triple.offsets()), list(triple.sizes()), list(triple.strides()))
    }
}

/// Inverse of the escapes the lexer accepts in string literals.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn join_types<'a>(types: impl Iterator<Item = &'a Type>) -> String {
    types.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
