//! Bridge method generation
//!
//! Walks the override chain of every concrete member method and emits the
//! forwarding methods the runtime needs when an override's erased signature
//! differs from the method it overrides.

use super::methods::{MethodSignature, ParamSlot, SlotKind};
use super::ClassLowerer;
use crate::error::{DiagnosticKind, LowerDiagnostic, LowerError, LowerResult};
use crate::ir::flags::{bridge_modifiers, ACC_ABSTRACT};
use crate::ir::{method_descriptor, IrExpr, IrMethod, IrStmt, IrType, SymbolRef};
use kiln_model::{ForeignClassId, ForeignMethod, MethodId};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::{trace, warn};

/// Emitted (name, descriptor) pairs of the class being built
pub(super) type EmittedSet = FxHashSet<(String, String)>;

impl<'a> ClassLowerer<'a> {
    /// Bridges required by a member method, in chain order
    pub(super) fn bridges_for(
        &mut self,
        id: MethodId,
        emitted: &mut EmittedSet,
    ) -> LowerResult<Vec<IrMethod>> {
        let model = self.model;
        let method = model.method(id);
        let mut bridges = Vec::new();
        let flags = self.method_modifiers(method);
        if method.is_static() || flags & ACC_ABSTRACT != 0 {
            return Ok(bridges);
        }
        let flags = bridge_modifiers(flags);

        let mut visited = FxHashSet::default();
        let mut current = id;
        while let Some(super_id) = model.method(current).super_method {
            let super_id = model.backing_method(super_id);
            if !visited.insert(super_id) {
                break;
            }
            let target = self.forward_target(current);
            let super_method = model.method(super_id);
            let proxy_for = model.class(super_method.owner).proxy_for;

            if let Some(foreign) = proxy_for {
                if self.proxy_covariant_bridge(current, foreign, &target, flags, emitted, &mut bridges)? {
                    break;
                }
            }

            let super_sig = self.method_signature(super_id);
            if super_sig.descriptor() != target.descriptor() {
                let bridge = self.forwarding_bridge(
                    &super_sig.name,
                    &super_sig.params,
                    super_sig.return_ty.clone(),
                    &target,
                    flags,
                    emitted,
                )?;
                bridges.extend(bridge);
            } else if let Some(foreign) = proxy_for {
                self.ancestor_interface_bridges(super_id, foreign, flags, emitted, &mut bridges)?;
                break;
            }
            current = super_id;
        }
        Ok(bridges)
    }

    /// Signature a bridge forwards to: the method as declared on this class
    fn forward_target(&self, id: MethodId) -> MethodSignature {
        let mut target = self.method_signature(id);
        target.owner = self.this_type();
        target
    }

    // ========================================================================
    // Proxy covariance
    // ========================================================================

    /// Bridge against the foreign method behind a proxy when the override's
    /// erased parameters or return differ from it. Returns whether the walk
    /// is finished for this method.
    fn proxy_covariant_bridge(
        &mut self,
        current: MethodId,
        foreign: ForeignClassId,
        target: &MethodSignature,
        flags: u32,
        emitted: &mut EmittedSet,
        bridges: &mut Vec<IrMethod>,
    ) -> LowerResult<bool> {
        let model = self.model;
        let method = model.method(current);
        if !method.type_vars.is_empty() {
            return Ok(false);
        }

        let declared = self.types.declared_params(method);
        let Some(foreign_method) = self.find_foreign_method(foreign, &target.name, &declared) else {
            let message = format!(
                "no method {}{} on {}; skipped the proxy bridge check",
                target.name,
                method_descriptor(&declared, &target.return_ty),
                model.foreign(foreign).name
            );
            warn!(owner = %self.ir.name, method = %target.name, "{}", message);
            self.diagnostics.push(LowerDiagnostic {
                kind: DiagnosticKind::UnresolvedForeignMethod,
                class: self.ir.name.clone(),
                method: target.name.clone(),
                message,
            });
            return Ok(false);
        };

        let (slots, return_ty) = self.foreign_slots(foreign_method);
        let params: Vec<IrType> = slots.iter().map(|s| s.ty.clone()).collect();
        if params == declared && return_ty == target.return_ty {
            return Ok(false);
        }
        let bridge =
            self.forwarding_bridge(&foreign_method.name, &slots, return_ty, target, flags, emitted)?;
        bridges.extend(bridge);
        Ok(true)
    }

    /// Foreign method a proxy override implements: searched through the
    /// foreign class and its ancestors by name and arity, preferring an exact
    /// erased parameter match over a unique assignable one
    fn find_foreign_method(
        &self,
        foreign: ForeignClassId,
        name: &str,
        params: &[IrType],
    ) -> Option<&'a ForeignMethod> {
        let model = self.model;
        let mut candidates = Vec::new();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([foreign]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let class = model.foreign(id);
            for method in &class.methods {
                if method.name != name || method.params.len() != params.len() {
                    continue;
                }
                let erased: Vec<IrType> = method.params.iter().map(|&t| self.types.ir_type(t)).collect();
                if erased == params {
                    return Some(method);
                }
                candidates.push((method, erased));
            }
            queue.extend(class.superclass);
            queue.extend(class.interfaces.iter().copied());
        }

        let mut assignable = candidates.into_iter().filter(|(_, erased)| {
            erased
                .iter()
                .zip(params)
                .all(|(expected, actual)| self.types.is_assignable(expected, actual))
        });
        let (first, _) = assignable.next()?;
        if assignable.next().is_some() {
            return None;
        }
        Some(first)
    }

    // ========================================================================
    // Interface-to-interface narrowing
    // ========================================================================

    /// Bridges for foreign ancestor interfaces whose method the proxied
    /// interface covariantly narrows
    fn ancestor_interface_bridges(
        &mut self,
        super_id: MethodId,
        foreign: ForeignClassId,
        flags: u32,
        emitted: &mut EmittedSet,
        bridges: &mut Vec<IrMethod>,
    ) -> LowerResult<()> {
        let model = self.model;
        let super_method = model.method(super_id);
        let class = model.foreign(foreign);
        if !class.is_interface || self.types.ir_type(super_method.return_type).is_primitive() {
            return Ok(());
        }
        let name = super_method.runtime_name();
        let Some(start) = class.declared_method(&name, &super_method.param_types()) else {
            return Ok(());
        };
        if !start.modifiers.is_abstract() {
            return Ok(());
        }

        let mut visited = FxHashSet::default();
        let mut work = VecDeque::from([(foreign, start)]);
        while let Some((class_id, narrowed)) = work.pop_front() {
            for &iface in &model.foreign(class_id).interfaces {
                let mut next = narrowed;
                if let Some(ancestor) = model.foreign(iface).declared_method(&narrowed.name, &narrowed.params) {
                    let ancestor_ret = self.types.ir_type(ancestor.return_type);
                    let narrowed_ret = self.types.ir_type(narrowed.return_type);
                    if ancestor_ret != narrowed_ret && self.types.is_assignable(&ancestor_ret, &narrowed_ret) {
                        let (target_slots, _) = self.foreign_slots(narrowed);
                        let target = MethodSignature {
                            owner: self.this_type(),
                            name: narrowed.name.clone(),
                            params: target_slots,
                            return_ty: narrowed_ret,
                            is_static: false,
                        };
                        let (slots, return_ty) = self.foreign_slots(ancestor);
                        let bridge =
                            self.forwarding_bridge(&ancestor.name, &slots, return_ty, &target, flags, emitted)?;
                        bridges.extend(bridge);
                        next = ancestor;
                    }
                }
                if visited.insert(iface) {
                    work.push_back((iface, next));
                }
            }
        }
        Ok(())
    }

    /// Positional `argN` parameters and return type of a foreign method
    fn foreign_slots(&self, method: &ForeignMethod) -> (Vec<ParamSlot>, IrType) {
        let slots = method
            .params
            .iter()
            .enumerate()
            .map(|(index, &ty)| ParamSlot {
                name: format!("arg{}", index),
                ty: self.types.ir_type(ty),
                kind: SlotKind::Declared(index),
            })
            .collect();
        (slots, self.types.ir_type(method.return_type))
    }

    // ========================================================================
    // Bridge bodies
    // ========================================================================

    /// A method with the given signature whose body forwards to `target` on
    /// the same receiver, casting arguments and result where the static types
    /// differ. `None` when the signature was already emitted.
    fn forwarding_bridge(
        &mut self,
        name: &str,
        slots: &[ParamSlot],
        return_ty: IrType,
        target: &MethodSignature,
        flags: u32,
        emitted: &mut EmittedSet,
    ) -> LowerResult<Option<IrMethod>> {
        let param_types: Vec<IrType> = slots.iter().map(|s| s.ty.clone()).collect();
        let descriptor = method_descriptor(&param_types, &return_ty);
        if !emitted.insert((name.to_string(), descriptor.clone())) {
            return Ok(None);
        }

        let declared_count = |params: &[ParamSlot]| {
            params
                .iter()
                .filter(|s| matches!(s.kind, SlotKind::Declared(_)))
                .count()
        };
        if declared_count(slots) != declared_count(&target.params) {
            return Err(LowerError::internal(format!(
                "bridge {}{} and {}{} differ in arity",
                name,
                descriptor,
                target.name,
                target.descriptor()
            )));
        }
        if target.return_ty.is_void() && !return_ty.is_void() {
            return Err(LowerError::internal(format!(
                "bridge {}{} cannot forward to void {}",
                name, descriptor, target.name
            )));
        }

        let params: Vec<SymbolRef> = slots
            .iter()
            .map(|slot| self.ctx.make_symbol(&slot.name, slot.ty.clone(), false))
            .collect();

        let mut args = Vec::with_capacity(target.params.len());
        for slot in &target.params {
            let arg = match (slot_symbol(slots, &params, slot.kind), slot.kind) {
                (Some(symbol), _) => IrExpr::identifier(symbol),
                (None, SlotKind::TypeParam(_)) => IrExpr::TypeHandle {
                    of: IrType::object(),
                    handle: self.type_handle_type(),
                },
                (None, SlotKind::Symbols) => IrExpr::Null(self.symbol_map_type()),
                (None, _) => {
                    return Err(LowerError::internal(format!(
                        "bridge {}{} has no value for '{}'",
                        name, descriptor, slot.name
                    )))
                }
            };
            let arg = if self.types.is_assignable(&slot.ty, &arg.ty()) {
                arg
            } else {
                IrExpr::cast(arg, slot.ty.clone())
            };
            args.push(arg);
        }

        let kind = if self.class.is_interface() {
            crate::ir::CallKind::Interface
        } else {
            crate::ir::CallKind::Virtual
        };
        let call = IrExpr::call(Some(IrExpr::This(self.this_type())), target.method_ref(kind), args);
        let body = if return_ty.is_void() {
            vec![IrStmt::Eval(call), IrStmt::Return(None)]
        } else if self.types.is_assignable(&return_ty, &target.return_ty) {
            vec![IrStmt::Return(Some(call))]
        } else {
            vec![IrStmt::Return(Some(IrExpr::cast(call, return_ty.clone())))]
        };

        trace!(
            owner = %self.ir.name,
            method = %name,
            descriptor = %descriptor,
            target = %target.descriptor(),
            "bridge"
        );
        Ok(Some(IrMethod::new(
            name,
            params,
            return_ty,
            flags,
            Some(IrStmt::Block(body)),
        )))
    }
}

fn slot_symbol<'s>(slots: &[ParamSlot], params: &'s [SymbolRef], kind: SlotKind) -> Option<&'s SymbolRef> {
    slots
        .iter()
        .position(|s| s.kind == kind)
        .and_then(|index| params.get(index))
}
