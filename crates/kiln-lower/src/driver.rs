//! Lowering entry points
//!
//! Single-class entry points plus a batch driver that lowers independent
//! classes on a pool of scoped worker threads. Workers share only the
//! read-only class model; each class gets its own lowerer.

use crate::config::LowerOptions;
use crate::error::{LowerError, LowerResult};
use crate::ir::IrClass;
use crate::lower::{ClassLowerer, LoweredClass};
use crossbeam::channel;
use kiln_model::{ClassId, ClassModel};
use tracing::{debug, warn};

/// Lower one class
pub fn lower_class(
    model: &ClassModel,
    class: ClassId,
    options: &LowerOptions,
) -> LowerResult<LoweredClass> {
    ClassLowerer::new(model, class, options)?.compile()
}

/// Build the interface-methods holder of an interface
pub fn lower_interface_methods_class(
    model: &ClassModel,
    interface: ClassId,
    options: &LowerOptions,
) -> LowerResult<IrClass> {
    ClassLowerer::new(model, interface, options)?.compile_interface_methods_class()
}

/// Lower many classes concurrently.
///
/// Results come back in the order of `classes`. A failing class does not
/// affect the others.
pub fn lower_classes(
    model: &ClassModel,
    classes: &[ClassId],
    options: &LowerOptions,
) -> Vec<LowerResult<LoweredClass>> {
    if classes.is_empty() {
        return Vec::new();
    }
    if let Err(err) = model.validate() {
        warn!(error = %err, "class model is invalid");
        return classes.iter().map(|_| Err(LowerError::from(err.clone()))).collect();
    }
    let workers = num_cpus::get().clamp(1, classes.len());
    debug!(classes = classes.len(), workers, "lowering batch");

    let (job_tx, job_rx) = channel::unbounded::<(usize, ClassId)>();
    for job in classes.iter().copied().enumerate() {
        if job_tx.send(job).is_err() {
            break;
        }
    }
    drop(job_tx);

    let (result_tx, result_rx) = channel::unbounded();
    let scoped = crossbeam::scope(|scope| {
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            scope.spawn(move |_| {
                for (index, class) in jobs.iter() {
                    let result = ClassLowerer::for_validated_model(model, class, options)
                        .and_then(ClassLowerer::compile);
                    if results.send((index, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);
    if scoped.is_err() {
        warn!("a lowering worker panicked");
    }

    let mut slots: Vec<Option<LowerResult<LoweredClass>>> = classes.iter().map(|_| None).collect();
    for (index, result) in result_rx.iter() {
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .zip(classes)
        .map(|(slot, &class)| {
            slot.unwrap_or_else(|| {
                Err(LowerError::internal(format!(
                    "lowering of class #{} did not complete",
                    class.as_u32()
                )))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_model::ModelBuilder;

    #[test]
    fn test_empty_batch() {
        let model = ModelBuilder::new().finish().unwrap();
        assert!(lower_classes(&model, &[], &LowerOptions::default()).is_empty());
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut builder = ModelBuilder::new();
        let ids: Vec<ClassId> = (0..8)
            .map(|i| builder.class(&format!("demo.C{}", i)).unwrap())
            .collect();
        let model = builder.finish().unwrap();

        let results = lower_classes(&model, &ids, &LowerOptions::default());
        let names: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().class.name)
            .collect();
        let expected: Vec<String> = (0..8).map(|i| format!("demo/C{}", i)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_holder_entry_point_rejects_classes() {
        let mut builder = ModelBuilder::new();
        let a = builder.class("demo.A").unwrap();
        let model = builder.finish().unwrap();
        let err = lower_interface_methods_class(&model, a, &LowerOptions::default()).unwrap_err();
        assert!(matches!(err, LowerError::InvalidClassKind { .. }));
    }
}
