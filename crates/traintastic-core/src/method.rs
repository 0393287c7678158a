//! Reflective method invocation.
//!
//! A [`Method`] wraps a closure so it can be looked up by name and invoked
//! generically (UI actions, scripted calls) without the caller needing to
//! know the owning object's concrete type.

use crate::error::Error;
use parking_lot::Mutex;

/// A named, invocable operation on an object.
///
/// `Args`/`Ret` are erased to `Value` tuples at the wire boundary in
/// `traintastic-net`; within a process the closure keeps its native types.
pub struct Method<Args, Ret> {
    name: String,
    enabled: Mutex<bool>,
    handler: Box<dyn Fn(Args) -> Result<Ret, Error> + Send + Sync>,
}

impl<Args, Ret> Method<Args, Ret> {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Args) -> Result<Ret, Error> + Send + Sync + 'static,
    {
        Method {
            name: name.into(),
            enabled: Mutex::new(true),
            handler: Box::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock()
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock() = enabled;
    }

    /// Invokes the method, failing with [`Error::NotWritable`] if it is
    /// currently disabled — the same error an object reports for a
    /// disabled property setter, since both mean "not usable right now".
    pub fn invoke(&self, args: Args) -> Result<Ret, Error> {
        if !self.is_enabled() {
            return Err(Error::NotWritable);
        }
        (self.handler)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invokes_handler() {
        let m: Method<i32, i32> = Method::new("double", |x: i32| Ok(x * 2));
        assert_eq!(m.invoke(21), Ok(42));
    }

    #[test]
    fn disabled_method_rejects_invocation() {
        let m: Method<(), ()> = Method::new("emergency_stop", |_| Ok(()));
        m.set_enabled(false);
        assert_eq!(m.invoke(()), Err(Error::NotWritable));
    }
}
