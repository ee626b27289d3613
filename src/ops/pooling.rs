use opgraph_shape_inference::ops::{self as rules, AutoPad, Padding};
use opgraph_shape_inference::{ElementType, InferShapes, InferShapesError};

use crate::ops::check_choice;

/// Return true if `rounding_type` selects ceil rounding of output sizes.
fn ceil_mode(rounding_type: &str) -> Result<bool, InferShapesError> {
    check_choice(rounding_type, &["floor", "ceil"], "unsupported rounding type")?;
    Ok(rounding_type.eq_ignore_ascii_case("ceil"))
}

define_op!(
    /// Max pooling over windows of size `kernel`.
    MaxPool("MaxPool", "opset1") {
        strides: Vec<usize>,
        pads_begin: Vec<usize>,
        pads_end: Vec<usize>,
        kernel: Vec<usize>,
        rounding_type: String = "floor".to_string(),
        auto_pad: AutoPad = AutoPad::Explicit,
    }
    |op, inputs| {
        rules::Pool {
            kernel_size: &op.kernel,
            strides: &op.strides,
            dilations: &[],
            padding: Padding::new(op.auto_pad, &op.pads_begin, &op.pads_end),
            ceil_mode: ceil_mode(&op.rounding_type)?,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Average pooling over windows of size `kernel`.
    AvgPool("AvgPool", "opset1") {
        strides: Vec<usize>,
        pads_begin: Vec<usize>,
        pads_end: Vec<usize>,
        kernel: Vec<usize>,
        exclude_pad: bool,
        rounding_type: String = "floor".to_string(),
        auto_pad: AutoPad = AutoPad::Explicit,
    }
    |op, inputs| {
        rules::Pool {
            kernel_size: &op.kernel,
            strides: &op.strides,
            dilations: &[],
            padding: Padding::new(op.auto_pad, &op.pads_begin, &op.pads_end),
            ceil_mode: ceil_mode(&op.rounding_type)?,
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Average pooling to the spatial size given by the second input.
    AdaptiveAvgPool("AdaptiveAvgPool", "opset8") {}
    |_op, inputs| {
        rules::AdaptivePool { index_type: None }.infer_shapes(inputs)
    }
);

define_op!(
    /// Max pooling to the spatial size given by the second input. The second
    /// output holds the indices of the selected elements.
    AdaptiveMaxPool("AdaptiveMaxPool", "opset8") {
        index_element_type: ElementType = ElementType::I64,
    }
    |op, inputs| {
        rules::AdaptivePool {
            index_type: Some(op.index_element_type),
        }
        .infer_shapes(inputs)
    }
);

define_op!(
    /// Gather `sizes` patches from an NCHW image into the channel dimension.
    ExtractImagePatches("ExtractImagePatches", "opset3") {
        sizes: Vec<usize>,
        strides: Vec<usize>,
        rates: Vec<usize>,
        auto_pad: AutoPad = AutoPad::Valid,
    }
    |op, inputs| {
        rules::ExtractImagePatches {
            sizes: &op.sizes,
            strides: &op.strides,
            rates: &op.rates,
            auto_pad: op.auto_pad,
        }
        .infer_shapes(inputs)
    }
);

#[cfg(test)]
mod tests {
    use opgraph_shape_inference::ops::AutoPad;
    use opgraph_shape_inference::{shape, ElementType, TensorInfo};

    use super::{AdaptiveAvgPool, AdaptiveMaxPool, AvgPool, ExtractImagePatches, MaxPool};
    use crate::attrs::{AttrReader, Attributes};
    use crate::graph::ErrorKind;
    use crate::op_registry::ReadOp;
    use crate::operator::{InferContext, Operator};
    use crate::options::BuildOptions;

    #[test]
    fn test_max_pool_rounding() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let data = TensorInfo::new(ElementType::F32, shape![1, 3, 9, 9]);
        let mut op = MaxPool {
            strides: vec![2, 2],
            pads_begin: vec![0, 0],
            pads_end: vec![0, 0],
            kernel: vec![2, 2],
            rounding_type: "floor".into(),
            auto_pad: AutoPad::Explicit,
        };

        let outputs = op.infer(&[data.clone()], &ctx).unwrap();
        assert_eq!(outputs[0].shape(), &shape![1, 3, 4, 4]);

        op.rounding_type = "CEIL".into();
        let outputs = op.infer(&[data.clone()], &ctx).unwrap();
        assert_eq!(outputs[0].shape(), &shape![1, 3, 5, 5]);

        op.rounding_type = "nearest".into();
        let err = op.infer(&[data], &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_avg_pool_attributes() {
        let attrs = Attributes::new()
            .with("strides", vec![1i64, 1])
            .with("pads_begin", vec![1i64, 1])
            .with("pads_end", vec![1i64, 1])
            .with("kernel", vec![3i64, 3])
            .with("exclude_pad", true);
        let reader = AttrReader::new(&attrs);
        let op = AvgPool::read(&reader).unwrap();
        reader.finish().unwrap();
        assert_eq!(op.rounding_type, "floor");
        assert_eq!(op.auto_pad, AutoPad::Explicit);

        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let outputs = op
            .infer(
                &[TensorInfo::new(ElementType::F32, shape![2, 4, 7, 7])],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![2, 4, 7, 7]);
    }

    #[test]
    fn test_adaptive_pool() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let data = TensorInfo::new(ElementType::F32, shape![1, 6, 8, 9]);
        let size = TensorInfo::from_ints(&[5, 7]);

        let outputs = AdaptiveAvgPool {}
            .infer(&[data.clone(), size.clone()], &ctx)
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].shape(), &shape![1, 6, 5, 7]);

        let op = AdaptiveMaxPool {
            index_element_type: ElementType::I32,
        };
        let outputs = op.infer(&[data, size], &ctx).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs[1],
            TensorInfo::new(ElementType::I32, shape![1, 6, 5, 7])
        );
    }

    #[test]
    fn test_extract_image_patches() {
        let options = BuildOptions::default();
        let ctx = InferContext::new(&options);
        let op = ExtractImagePatches {
            sizes: vec![3, 3],
            strides: vec![5, 5],
            rates: vec![1, 1],
            auto_pad: AutoPad::Valid,
        };
        let outputs = op
            .infer(
                &[TensorInfo::new(ElementType::I32, shape![64, 3, 10, 10])],
                &ctx,
            )
            .unwrap();
        assert_eq!(outputs[0].shape(), &shape![64, 27, 2, 2]);
    }
}
