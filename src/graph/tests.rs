use std::error::Error;

use opgraph_shape_inference::{shape, AutoBroadcast, Dimension, ElementType, TensorInfo};

use super::{Graph, NodeRef};
use crate::builder;
use crate::graph::ErrorKind;
use crate::operator::InferContext;
use crate::options::BuildOptions;

const NUMPY: AutoBroadcast = AutoBroadcast::Numpy;

fn f32_param(name: &str, shape: &[usize]) -> Result<NodeRef, Box<dyn Error>> {
    Ok(builder::parameter(name, shape, ElementType::F32)?)
}

#[test]
fn test_graph_nodes_are_topologically_ordered() -> Result<(), Box<dyn Error>> {
    let a = f32_param("a", &[2, 3])?;
    let b = f32_param("b", &[3])?;
    let sum = builder::add(&a, &b, NUMPY)?;
    let product = builder::multiply(&sum, &a, NUMPY)?;
    let graph = Graph::new([&product], [&a, &b], "graph")?;

    assert_eq!(graph.name(), "graph");
    assert_eq!(graph.nodes().len(), 5);
    for (i, node) in graph.nodes().iter().enumerate() {
        for input in node.inputs() {
            let pos = graph
                .nodes()
                .iter()
                .position(|n| n.ptr_eq(input.node()))
                .unwrap();
            assert!(pos < i, "{} appears before its input", node.friendly_name());
        }
    }
    assert_eq!(graph.nodes().last().unwrap().type_name(), "Result");
    assert_eq!(graph.result_infos(), [TensorInfo::new(ElementType::F32, shape![2, 3])]);

    Ok(())
}

#[test]
fn test_dangling_parameter() -> Result<(), Box<dyn Error>> {
    let a = f32_param("a", &[2])?;
    let b = f32_param("b", &[2])?;
    let sum = builder::add(&a, &b, NUMPY)?;

    let err = Graph::new([&sum], [&a], "graph").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::DanglingParameter);
    assert!(err.op_path().is_empty());
    assert!(err.to_string().contains("\"graph\" uses parameter b"));

    Ok(())
}

#[test]
fn test_unused_parameter() -> Result<(), Box<dyn Error>> {
    let a = f32_param("a", &[2])?;
    let unused = f32_param("unused", &[2])?;
    let doubled = builder::add(&a, &a, NUMPY)?;

    let graph = Graph::with_options(
        [&doubled],
        [&a, &unused],
        "graph",
        &BuildOptions::default(),
    )?;
    assert_eq!(graph.parameters().len(), 2);
    assert!(graph.nodes()[0].ptr_eq(&unused));

    let strict = BuildOptions::default().with_strict_parameters(true);
    let err = Graph::with_options([&doubled], [&a, &unused], "graph", &strict)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::UnusedParameter);

    Ok(())
}

#[test]
fn test_invalid_parameters() -> Result<(), Box<dyn Error>> {
    let a = f32_param("a", &[2])?;
    let doubled = builder::add(&a, &a, NUMPY)?;

    let err = Graph::new([&doubled], [&a, &doubled], "graph").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(err.op_path(), ["Add"]);

    let err = Graph::new([&doubled], [&a, &a], "graph").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    Ok(())
}

#[test]
fn test_result_and_parameter_index() -> Result<(), Box<dyn Error>> {
    let a = f32_param("a", &[2])?;
    let b = f32_param("b", &[2])?;
    let sum = builder::add(&a, &b, NUMPY)?;
    let result = builder::result(&sum)?;
    let product = builder::multiply(&a, &b, NUMPY)?;
    let unrelated = builder::subtract(&a, &b, NUMPY)?;

    let graph = Graph::new([&result, &product], [&a, &b], "graph")?;

    // Existing `Result` nodes are used as-is.
    assert!(graph.results()[0].ptr_eq(&result));
    assert_eq!(graph.results()[1].type_name(), "Result");

    assert_eq!(graph.result_index(&(&sum).into()), Some(0));
    assert_eq!(graph.result_index(&(&result).into()), Some(0));
    assert_eq!(graph.result_index(&(&product).into()), Some(1));
    assert_eq!(graph.result_index(&(&unrelated).into()), None);

    assert_eq!(graph.parameter_index(&b), Some(1));
    assert_eq!(graph.parameter_index(&sum), None);

    Ok(())
}

#[test]
fn test_infer_with_seeds() -> Result<(), Box<dyn Error>> {
    let a = builder::parameter("a", shape![Dimension::dynamic(), 3], ElementType::F32)?;
    let b = f32_param("b", &[3])?;
    let sum = builder::add(&a, &b, NUMPY)?;
    let graph = Graph::new([&sum], [&a, &b], "graph")?;

    assert_eq!(
        graph.result_infos()[0].shape(),
        &shape![Dimension::dynamic(), 3]
    );

    let options = BuildOptions::default();
    let seeds = [
        TensorInfo::new(ElementType::F32, shape![2, 3]),
        TensorInfo::new(ElementType::F32, shape![1]),
    ];
    let results = graph.infer_with(&seeds, &InferContext::new(&options))?;
    assert_eq!(results, [TensorInfo::new(ElementType::F32, shape![2, 3])]);

    // Seeds which the nodes reject fail with the error of the node.
    let seeds = [
        TensorInfo::new(ElementType::F32, shape![2, 3]),
        TensorInfo::new(ElementType::F32, shape![4]),
    ];
    let err = graph
        .infer_with(&seeds, &InferContext::new(&options))
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::BroadcastError);

    Ok(())
}

#[test]
fn test_graph_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Graph>();
    assert_send_sync::<NodeRef>();
}
