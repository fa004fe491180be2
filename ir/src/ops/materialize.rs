//! Sub-value extraction.

use snafu::ensure;

use super::expect_results;
use crate::Result;
use crate::error::{
    DynamicVectorShapeSnafu, InvalidOperandKindSnafu, RankMismatchSnafu, ResultTypeMismatchSnafu,
    ScalarResultRequiresUnitSizesSnafu, SliceOutOfBoundsSnafu,
};
use crate::mixed::{MixedIndex, OffsetsSizesStrides};
use crate::types::{Dim, Type};
use crate::value::Value;

/// Extract the part of a tensor or vector addressed by a triple.
///
/// The result has the source's container kind with shape equal to the sizes,
/// or is a bare scalar of the element type when every size is statically one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOp {
    source: Value,
    triple: OffsetsSizesStrides,
}

impl MaterializeOp {
    pub fn new(source: Value, triple: OffsetsSizesStrides) -> Result<Self> {
        let op = Self { source, triple };
        op.check_operands()?;
        Ok(op)
    }

    fn check_operands(&self) -> Result<()> {
        let ty = self.source.ty();
        ensure!(
            ty.is_shaped(),
            InvalidOperandKindSnafu { operand: "materialize source", expected: "a tensor or vector", actual: ty.clone() }
        );
        ensure!(
            self.triple.rank() == ty.rank(),
            RankMismatchSnafu { what: "materialize triple", expected: ty.rank(), actual: self.triple.rank() }
        );
        self.triple.validate()
    }

    pub fn source(&self) -> &Value {
        &self.source
    }

    pub fn triple(&self) -> &OffsetsSizesStrides {
        &self.triple
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Value, &mut OffsetsSizesStrides) {
        (&mut self.source, &mut self.triple)
    }

    /// Result type for the requested form.
    ///
    /// With `scalar` set, every size must be the constant 1.
    pub fn infer_result_type(&self, scalar: bool) -> Result<Type> {
        let Some(shaped) = self.source.ty().as_shaped() else {
            return InvalidOperandKindSnafu {
                operand: "materialize source",
                expected: "a tensor or vector",
                actual: self.source.ty().clone(),
            }
            .fail();
        };

        if scalar {
            ensure!(self.triple.sizes().iter().all(|s| *s == MixedIndex::Const(1)), ScalarResultRequiresUnitSizesSnafu);
            return Ok(Type::Scalar(shaped.element));
        }

        let shape = self.triple.sizes().iter().map(MixedIndex::to_dim);
        let ty = match self.source.ty() {
            Type::Vector(_) => Type::vector(shape, shaped.element),
            _ => Type::tensor(shape, shaped.element),
        };
        if let Type::Vector(v) = &ty {
            ensure!(v.is_static(), DynamicVectorShapeSnafu { ty: ty.clone() });
        }
        Ok(ty)
    }

    pub(crate) fn verify(&self, results: &[Value]) -> Result<()> {
        self.check_operands()?;
        expect_results("materialize", results, 1)?;

        let actual = results[0].ty();
        let expected = self.infer_result_type(actual.is_scalar())?;
        ensure!(*actual == expected, ResultTypeMismatchSnafu { expected, actual: actual.clone() });
        self.check_static_bounds()
    }

    /// Reject reads that are out of range on a statically known source extent.
    fn check_static_bounds(&self) -> Result<()> {
        let dims = self.source.ty().dims();
        let triple = &self.triple;
        for (dim, (extent, ((offset, size), stride))) in
            dims.iter().zip(triple.offsets().iter().zip(triple.sizes()).zip(triple.strides())).enumerate()
        {
            let (Dim::Static(extent), Some(offset), Some(size), Some(stride)) =
                (extent, offset.as_const(), size.as_const(), stride.as_const())
            else {
                continue;
            };
            if size == 0 {
                continue;
            }
            let last = (size - 1).checked_mul(stride).and_then(|span| span.checked_add(offset));
            let in_bounds = offset < *extent as i64 && last.is_some_and(|last| (0..*extent as i64).contains(&last));
            ensure!(in_bounds, SliceOutOfBoundsSnafu { dim, offset, size, stride, extent: *extent });
        }
        Ok(())
    }

    /// Zero offsets, unit strides and full static sizes with an unchanged type.
    pub fn is_trivial(&self, result_ty: &Type) -> bool {
        let source_ty = self.source.ty();
        if result_ty != source_ty {
            return false;
        }
        let triple = &self.triple;
        let zero_offsets = triple.offsets().iter().all(|o| *o == MixedIndex::Const(0));
        let unit_strides = triple.strides().iter().all(|s| *s == MixedIndex::Const(1));
        let full_sizes = triple
            .sizes()
            .iter()
            .zip(source_ty.dims())
            .all(|(size, dim)| matches!((size.as_const(), dim), (Some(s), Dim::Static(d)) if s as u64 == *d));
        zero_offsets && unit_strides && full_sizes
    }
}
