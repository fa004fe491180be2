//! Recursive-descent parser for the textual form.
//!
//! Operations are appended through [`Builder`], so parsed nodes go through
//! the same local verification as programmatically built ones. Whole
//! functions are verified once their body is complete.

use std::collections::HashMap;
use std::str::FromStr;

use smallvec::SmallVec;
use snafu::ensure;

use gmlst_dtype::DType;

use super::lexer::{Lexer, Spanned, Token};
use crate::Result;
use crate::builder::Builder;
use crate::error::{Error, ParseSnafu, TypeMismatchSnafu};
use crate::func::{Function, Module};
use crate::mixed::{MixedIndex, MixedIndices, OffsetsSizesStrides};
use crate::op::Op;
use crate::ops::{FusionOp, LoopHeader, LoopKind, LoopOp, MaterializeOp, SetUpdate, TileOp, YieldOp};
use crate::region::{Block, Region};
use crate::types::{BinaryOp, ConstValue, Dim, TileType, Type};
use crate::value::Value;
use crate::verify::verify_function;

/// Parse a module of zero or more functions.
#[tracing::instrument(skip_all, fields(len = source.len()))]
pub fn parse_module(source: &str) -> Result<Module> {
    let mut parser = Parser::new(source)?;
    let mut module = Module::default();
    while parser.peek() != &Token::Eof {
        module.push(parser.parse_function()?);
    }
    tracing::debug!(functions = module.functions().len(), "parsed module");
    Ok(module)
}

/// Parse exactly one function.
#[tracing::instrument(skip_all, fields(len = source.len()))]
pub fn parse_function(source: &str) -> Result<Function> {
    let mut parser = Parser::new(source)?;
    let function = parser.parse_function()?;
    parser.expect(Token::Eof)?;
    Ok(function)
}

/// Parse a standalone type such as `tensor<4x?xf32>`, `!tile<2x2>` or `index`.
pub fn parse_type(text: &str) -> Result<Type> {
    let mut parser = Parser::new(text)?;
    let ty = parser.parse_type()?;
    parser.expect(Token::Eof)?;
    Ok(ty)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    names: HashMap<String, SmallVec<[Value; 4]>>,
}

impl Parser {
    fn new(source: &str) -> Result<Self> {
        Ok(Self { tokens: Lexer::new(source).tokenize()?, pos: 0, names: HashMap::new() })
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).or(self.tokens.last()).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let (line, column) =
            self.tokens.get(self.pos).or(self.tokens.last()).map(|t| (t.line, t.column)).unwrap_or((1, 1));
        ParseSnafu { line, column, message: message.into() }.build()
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if *self.peek() != expected {
            return Err(self.error(format!("expected {expected}, got {}", self.peek())));
        }
        self.advance();
        Ok(())
    }

    fn eat(&mut self, token: &Token) -> bool {
        let matched = self.peek() == token;
        if matched {
            self.advance();
        }
        matched
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(word) if word == keyword)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if !self.is_keyword(keyword) {
            return Err(self.error(format!("expected '{keyword}', got {}", self.peek())));
        }
        self.advance();
        Ok(())
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Token::Ident(word) => Ok(word),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, got {other}")))
            }
        }
    }

    /// Comma-separated list; `item` is not called when `close` follows immediately.
    fn comma_list<T>(&mut self, close: &Token, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        if self.peek() == close {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Name being defined: `%name` without a result index.
    fn parse_def_name(&mut self) -> Result<String> {
        match self.advance() {
            Token::Value { name, index: None } => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected value name, got {other}")))
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        let Token::Value { name, index } = self.peek().clone() else {
            return Err(self.error(format!("expected value, got {}", self.peek())));
        };
        let value = match (self.names.get(&name), index) {
            (Some(values), None) if values.len() == 1 => values[0].clone(),
            (Some(values), Some(index)) if index < values.len() => values[index].clone(),
            (Some(_), _) => return Err(self.error(format!("invalid result reference to '%{name}'"))),
            (None, _) => return Err(self.error(format!("use of undefined value '%{name}'"))),
        };
        self.advance();
        Ok(value)
    }

    fn bind(&mut self, name: String, values: impl IntoIterator<Item = Value>) {
        self.names.insert(name, values.into_iter().collect());
    }

    fn parse_paren_values(&mut self) -> Result<Vec<Value>> {
        self.expect(Token::LParen)?;
        let values = self.comma_list(&Token::RParen, Self::parse_value)?;
        self.expect(Token::RParen)?;
        Ok(values)
    }

    /// `: type, type` checked against already-known operand types.
    fn check_types(&mut self, what: &'static str, values: &[Value]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.expect(Token::Colon)?;
        let types = self.parse_type_list()?;
        if types.len() != values.len() {
            return Err(self.error(format!("{what}: {} values but {} types", values.len(), types.len())));
        }
        check_types_match(what, values, &types)
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn parse_type(&mut self) -> Result<Type> {
        let parsed = match self.peek() {
            Token::Type(text) => parse_type_literal(text),
            Token::Ident(word) => DType::from_mnemonic(word).map(Type::Scalar),
            _ => None,
        };
        match parsed {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(self.error(format!("expected type, got {}", self.peek()))),
        }
    }

    fn parse_type_list(&mut self) -> Result<Vec<Type>> {
        let mut types = vec![self.parse_type()?];
        while self.eat(&Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    fn parse_tile_type(&mut self) -> Result<TileType> {
        match self.parse_type()? {
            Type::Tile(tile) => Ok(tile),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected tile type, got {other}")))
            }
        }
    }

    // =========================================================================
    // Functions and blocks
    // =========================================================================

    fn parse_function(&mut self) -> Result<Function> {
        self.names.clear();
        self.expect_keyword("func")?;
        let name = match self.advance() {
            Token::Symbol(name) => name,
            other => {
                self.pos -= 1;
                return Err(self.error(format!("expected function name, got {other}")));
            }
        };

        self.expect(Token::LParen)?;
        let args = self.comma_list(&Token::RParen, |p| {
            let name = p.parse_def_name()?;
            p.expect(Token::Colon)?;
            Ok((name, p.parse_type()?))
        })?;
        self.expect(Token::RParen)?;

        let mut result_types = Vec::new();
        if self.eat(&Token::Arrow) {
            self.expect(Token::LParen)?;
            result_types = self.comma_list(&Token::RParen, Self::parse_type)?;
            self.expect(Token::RParen)?;
        }

        let mut function = Function::new(name, args.iter().map(|(_, ty)| ty.clone()), result_types);
        for ((name, _), value) in args.into_iter().zip(function.arguments().to_vec()) {
            self.bind(name, [value]);
        }
        *function.body_mut() = self.parse_block(Block::new([]))?;
        verify_function(&function)?;
        Ok(function)
    }

    fn parse_block(&mut self, block: Block) -> Result<Block> {
        let mut builder = Builder::new(block);
        self.expect(Token::LBrace)?;
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            self.parse_operation(&mut builder)?;
        }
        self.expect(Token::RBrace)?;
        Ok(builder.into_block())
    }

    fn parse_region(&mut self, block: Block) -> Result<Region> {
        Ok(Region::with_block(self.parse_block(block)?))
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn parse_operation(&mut self, b: &mut Builder) -> Result<()> {
        let binding = self.parse_binding()?;
        let mnemonic = self.expect_ident()?;

        let results = match mnemonic.as_str() {
            "constant" => self.parse_constant(b)?,
            "splat" => {
                let value = self.parse_value()?;
                self.expect(Token::Colon)?;
                let ty = self.parse_type()?;
                b.insert(Op::Splat(value), [ty])?
            }
            "tile" => {
                let triple = self.parse_triple()?;
                self.expect(Token::Colon)?;
                let ty = self.parse_tile_type()?;
                b.insert(Op::Tile(TileOp::new(triple)), [Type::Tile(ty)])?
            }
            "materialize" => self.parse_materialize(b)?,
            "for" => self.parse_loop(b, LoopKind::Sequential)?,
            "parallel" => self.parse_loop(b, LoopKind::parallel())?,
            "set_yield" => self.parse_set_yield(b)?,
            "yield" => {
                let values = self.parse_terminator_values("yield operand")?;
                b.insert(Op::Yield(YieldOp::new(values)), [])?
            }
            "return" => {
                let values = self.parse_terminator_values("return operand")?;
                b.insert(Op::Return(values.into_iter().collect()), [])?
            }
            "fusion" => self.parse_fusion(b)?,
            other => match BinaryOp::from_str(other) {
                Ok(op) => {
                    let lhs = self.parse_value()?;
                    self.expect(Token::Comma)?;
                    let rhs = self.parse_value()?;
                    self.expect(Token::Colon)?;
                    let ty = self.parse_type()?;
                    b.insert(Op::Binary(op, lhs, rhs), [ty])?
                }
                Err(_) => return Err(self.error(format!("unknown operation '{other}'"))),
            },
        };

        match binding {
            Some((name, count)) => {
                if results.len() != count {
                    return Err(self.error(format!("'{mnemonic}' defines {} results, binding expects {count}", results.len())));
                }
                self.bind(name, results);
            }
            None if !results.is_empty() => {
                return Err(self.error(format!("results of '{mnemonic}' must be bound")));
            }
            None => {}
        }
        Ok(())
    }

    /// `%name =` or `%name:count =`.
    fn parse_binding(&mut self) -> Result<Option<(String, usize)>> {
        let is_binding = matches!(self.peek(), Token::Value { .. })
            && (self.peek_at(1) == &Token::Eq
                || (self.peek_at(1) == &Token::Colon
                    && matches!(self.peek_at(2), Token::Int(_))
                    && self.peek_at(3) == &Token::Eq));
        if !is_binding {
            return Ok(None);
        }
        let name = self.parse_def_name()?;
        let mut count = 1;
        if self.eat(&Token::Colon) {
            let Token::Int(n) = self.advance() else {
                return Err(self.error("expected result count"));
            };
            count = usize::try_from(n).map_err(|_| self.error("result count must be non-negative"))?;
        }
        self.expect(Token::Eq)?;
        Ok(Some((name, count)))
    }

    fn parse_constant(&mut self, b: &mut Builder) -> Result<SmallVec<[Value; 4]>> {
        let literal = self.advance();
        self.expect(Token::Colon)?;
        let ty = self.parse_type()?;
        let Type::Scalar(dtype) = ty else {
            return Err(self.error(format!("constants must have a scalar type, got {ty}")));
        };

        let value = match (&literal, dtype) {
            (Token::Int(v), d) if d.is_float() => ConstValue::Float(*v as f64),
            (Token::Int(v), d) if d.is_unsigned() => match u64::try_from(*v) {
                Ok(v) => ConstValue::UInt(v),
                Err(_) => return Err(self.error(format!("negative literal {v} for unsigned type {dtype}"))),
            },
            (Token::Int(v), _) => ConstValue::Int(*v),
            (Token::UInt(v), d) if d.is_unsigned() => ConstValue::UInt(*v),
            (Token::UInt(v), d) if d.is_float() => ConstValue::Float(*v as f64),
            (Token::UInt(v), _) => return Err(self.error(format!("integer literal {v} is out of range for {dtype}"))),
            (Token::Float(v), _) => ConstValue::Float(*v),
            (Token::Ident(word), _) => match word.as_str() {
                "true" => ConstValue::Bool(true),
                "false" => ConstValue::Bool(false),
                "inf" => ConstValue::Float(f64::INFINITY),
                "NaN" => ConstValue::Float(f64::NAN),
                _ => return Err(self.error(format!("invalid constant literal '{word}'"))),
            },
            (other, _) => return Err(self.error(format!("invalid constant literal {other}"))),
        };
        b.insert(Op::Constant(value), [Type::Scalar(dtype)])
    }

    fn parse_index_list(&mut self) -> Result<MixedIndices> {
        self.expect(Token::LBracket)?;
        let entries = self.comma_list(&Token::RBracket, |p| match p.peek() {
            Token::Int(v) => {
                let v = *v;
                p.advance();
                Ok(MixedIndex::Const(v))
            }
            _ => p.parse_value().map(MixedIndex::Dynamic),
        })?;
        self.expect(Token::RBracket)?;
        Ok(entries.into_iter().collect())
    }

    fn parse_triple(&mut self) -> Result<OffsetsSizesStrides> {
        let offsets = self.parse_index_list()?;
        let sizes = self.parse_index_list()?;
        let strides = self.parse_index_list()?;
        OffsetsSizesStrides::new(offsets, sizes, strides)
    }

    fn parse_materialize(&mut self, b: &mut Builder) -> Result<SmallVec<[Value; 4]>> {
        let source = self.parse_value()?;
        let triple = self.parse_triple()?;
        self.expect(Token::Colon)?;
        let source_ty = self.parse_type()?;
        check_types_match("materialize source", std::slice::from_ref(&source), &[source_ty])?;
        self.expect_keyword("to")?;
        let result_ty = self.parse_type()?;
        b.insert(Op::Materialize(MaterializeOp::new(source, triple)?), [result_ty])
    }

    fn parse_loop(&mut self, b: &mut Builder, mut kind: LoopKind) -> Result<SmallVec<[Value; 4]>> {
        self.expect(Token::LParen)?;
        let ivs = self.comma_list(&Token::RParen, Self::parse_def_name)?;
        self.expect(Token::RParen)?;
        self.expect(Token::Eq)?;
        let lower = self.parse_paren_values()?;
        self.expect_keyword("to")?;
        let upper = self.parse_paren_values()?;
        self.expect_keyword("step")?;
        let step = self.parse_paren_values()?;

        self.expect_keyword("outs")?;
        self.expect(Token::LParen)?;
        let outs = self.comma_list(&Token::RParen, |p| {
            let name = p.parse_def_name()?;
            p.expect(Token::Eq)?;
            let init = p.parse_value()?;
            p.expect(Token::Colon)?;
            let ty = p.parse_type()?;
            check_types_match("loop output", std::slice::from_ref(&init), &[ty])?;
            Ok((name, init))
        })?;
        self.expect(Token::RParen)?;

        if self.is_keyword("distribution") {
            let LoopKind::Parallel { distribution } = &mut kind else {
                return Err(self.error("'distribution' is only valid on parallel loops"));
            };
            self.advance();
            match self.advance() {
                Token::Str(tag) => *distribution = Some(tag),
                other => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected distribution string, got {other}")));
                }
            }
        }

        let (out_names, outputs): (Vec<_>, Vec<_>) = outs.into_iter().unzip();
        let header = LoopHeader::builder().lower(lower).upper(upper).step(step).outputs(outputs).build();
        let block = Block::new(header.body_arg_types());
        let args = block.arguments().to_vec();
        for (name, arg) in ivs.into_iter().chain(out_names).zip(args) {
            self.bind(name, [arg]);
        }
        let body = self.parse_region(block)?;

        let result_types = if self.eat(&Token::Colon) {
            self.parse_type_list()?
        } else {
            header.outputs.iter().map(|o| o.ty().clone()).collect()
        };
        let op = LoopOp::new(kind, header, body)?;
        b.insert(Op::Loop(op), result_types)
    }

    fn parse_set_yield(&mut self, b: &mut Builder) -> Result<SmallVec<[Value; 4]>> {
        let mut updates = Vec::new();
        if matches!(self.peek(), Token::Value { .. }) {
            loop {
                let src = self.parse_value()?;
                self.expect_keyword("at")?;
                let set = self.parse_value()?;
                self.expect_keyword("into")?;
                let dst = self.parse_value()?;

                let accumulator = if self.is_keyword("acc") {
                    self.advance();
                    self.expect(Token::LParen)?;
                    let new = self.parse_def_name()?;
                    self.expect(Token::Comma)?;
                    let old = self.parse_def_name()?;
                    self.expect(Token::Colon)?;
                    let ty = self.parse_type()?;
                    self.expect(Token::RParen)?;
                    let block = Block::new([ty.clone(), ty]);
                    self.bind(new, [block.arguments()[0].clone()]);
                    self.bind(old, [block.arguments()[1].clone()]);
                    Some(self.parse_region(block)?)
                } else {
                    None
                };
                updates.push(SetUpdate { src, dst, set, accumulator });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }

            self.expect(Token::Colon)?;
            for (position, update) in updates.iter().enumerate() {
                if position > 0 {
                    self.expect(Token::Comma)?;
                }
                let src_ty = self.parse_type()?;
                self.expect_keyword("into")?;
                let dst_ty = self.parse_type()?;
                self.expect(Token::LBracket)?;
                let set_ty = self.parse_tile_type()?;
                self.expect(Token::RBracket)?;
                check_types_match("set_yield source", std::slice::from_ref(&update.src), &[src_ty])?;
                check_types_match("set_yield destination", std::slice::from_ref(&update.dst), &[dst_ty])?;
                check_types_match("set_yield set", std::slice::from_ref(&update.set), &[Type::Tile(set_ty)])?;
            }
        }
        b.set_yield(updates)?;
        Ok(SmallVec::new())
    }

    fn parse_terminator_values(&mut self, what: &'static str) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        if matches!(self.peek(), Token::Value { .. }) {
            values.push(self.parse_value()?);
            while self.eat(&Token::Comma) {
                values.push(self.parse_value()?);
            }
        }
        self.check_types(what, &values)?;
        Ok(values)
    }

    fn parse_fusion(&mut self, b: &mut Builder) -> Result<SmallVec<[Value; 4]>> {
        self.expect(Token::LParen)?;
        let entries = self.comma_list(&Token::RParen, |p| {
            let name = p.parse_def_name()?;
            p.expect(Token::Eq)?;
            let input = p.parse_value()?;
            p.expect(Token::Colon)?;
            let ty = p.parse_type()?;
            check_types_match("fusion input", std::slice::from_ref(&input), &[ty])?;
            Ok((name, input))
        })?;
        self.expect(Token::RParen)?;

        let (names, inputs): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        let block = Block::new(inputs.iter().map(|v| v.ty().clone()));
        for (name, arg) in names.into_iter().zip(block.arguments().to_vec()) {
            self.bind(name, [arg]);
        }
        let body = self.parse_region(block)?;
        let result_types = if self.eat(&Token::Colon) { self.parse_type_list()? } else { Vec::new() };
        b.insert(Op::Fusion(FusionOp::new(inputs, body)?), result_types)
    }
}

fn check_types_match(what: &'static str, values: &[Value], types: &[Type]) -> Result<()> {
    for (value, ty) in values.iter().zip(types) {
        ensure!(value.ty() == ty, TypeMismatchSnafu { what, expected: ty.clone(), actual: value.ty().clone() });
    }
    Ok(())
}

/// Parse the text of a `tensor<..>`, `vector<..>` or `!tile<..>` literal.
fn parse_type_literal(text: &str) -> Option<Type> {
    if let Some(body) = text.strip_prefix("!tile<").and_then(|t| t.strip_suffix('>')) {
        let (dims, rest) = parse_dims(body)?;
        return rest.is_empty().then(|| Type::tile(dims));
    }

    let (is_vector, body) = match text.strip_prefix("tensor<") {
        Some(body) => (false, body),
        None => (true, text.strip_prefix("vector<")?),
    };
    let body = body.strip_suffix('>')?;
    let (dims, element) = parse_dims(body)?;
    let element = DType::from_mnemonic(element)?;
    Some(if is_vector { Type::vector(dims, element) } else { Type::tensor(dims, element) })
}

/// Leading `dim x dim x ...` prefix; returns the dims and what follows the last `x`.
///
/// Element types may themselves contain an `x` (`index`), so dims are consumed
/// only while the next chunk starts with a digit or `?`.
fn parse_dims(mut text: &str) -> Option<(SmallVec<[Dim; 4]>, &str)> {
    let mut dims = SmallVec::new();
    loop {
        let dim = if let Some(rest) = text.strip_prefix('?') {
            text = rest;
            Dim::Dynamic
        } else {
            let len = text.bytes().take_while(u8::is_ascii_digit).count();
            if len == 0 {
                break;
            }
            let value = text[..len].parse().ok()?;
            text = &text[len..];
            Dim::Static(value)
        };
        dims.push(dim);
        match text.strip_prefix('x') {
            Some(rest) => text = rest,
            None => {
                // Only tiles may end without an element type.
                return text.is_empty().then_some((dims, text));
            }
        }
    }
    Some((dims, text))
}
