//! `ds_map` and `ds_list` handles.
//!
//! Maps and lists share one id counter, so a handle never names both kinds.
//! Map keys are the string form of whatever key value was passed, and maps
//! iterate in insertion order.

use super::{arg, int, BuiltinFn};
use crate::error::VmResult;
use crate::runtime::Runtime;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DsStore {
    maps: HashMap<i32, IndexMap<String, Value>>,
    lists: HashMap<i32, Vec<Value>>,
    next_id: i32,
}

impl DsStore {
    fn allocate(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_map(&mut self) -> i32 {
        let id = self.allocate();
        self.maps.insert(id, IndexMap::new());
        id
    }

    pub fn create_list(&mut self) -> i32 {
        let id = self.allocate();
        self.lists.insert(id, Vec::new());
        id
    }

    pub fn map(&self, id: i32) -> Option<&IndexMap<String, Value>> {
        self.maps.get(&id)
    }

    pub fn map_mut(&mut self, id: i32) -> Option<&mut IndexMap<String, Value>> {
        self.maps.get_mut(&id)
    }

    pub fn list(&self, id: i32) -> Option<&Vec<Value>> {
        self.lists.get(&id)
    }
}

pub fn register(m: &mut HashMap<&'static str, BuiltinFn>) {
    m.insert("ds_map_create", |rt, _| Ok(Value::from(rt.ds.create_map())));
    m.insert("ds_map_destroy", |rt, a| {
        rt.ds.maps.remove(&int(a, 0)?);
        Ok(Value::ZERO)
    });
    m.insert("ds_map_add", map_set);
    m.insert("ds_map_set", map_set);
    m.insert("ds_map_replace", map_set);
    m.insert("ds_map_find_value", |rt, a| {
        let key = arg(a, 1)?.to_str();
        Ok(rt
            .ds
            .map(int(a, 0)?)
            .and_then(|m| m.get(&key))
            .cloned()
            .unwrap_or(Value::Undefined))
    });
    m.insert("ds_map_exists", |rt, a| {
        let key = arg(a, 1)?.to_str();
        Ok(Value::from(rt.ds.map(int(a, 0)?).is_some_and(|m| m.contains_key(&key))))
    });
    m.insert("ds_map_delete", |rt, a| {
        let key = arg(a, 1)?.to_str();
        if let Some(map) = rt.ds.map_mut(int(a, 0)?) {
            map.shift_remove(&key);
        }
        Ok(Value::ZERO)
    });
    m.insert("ds_map_size", |rt, a| {
        Ok(Value::from(rt.ds.map(int(a, 0)?).map_or(0, |m| m.len() as i32)))
    });
    m.insert("ds_map_clear", |rt, a| {
        if let Some(map) = rt.ds.map_mut(int(a, 0)?) {
            map.clear();
        }
        Ok(Value::ZERO)
    });
    m.insert("ds_map_copy", map_copy);
    m.insert("ds_map_find_first", |rt, a| {
        Ok(key_value(rt.ds.map(int(a, 0)?).and_then(|m| m.keys().next())))
    });
    m.insert("ds_map_find_last", |rt, a| {
        Ok(key_value(rt.ds.map(int(a, 0)?).and_then(|m| m.keys().last())))
    });
    m.insert("ds_map_find_next", |rt, a| neighbour_key(rt, a, 1));
    m.insert("ds_map_find_previous", |rt, a| neighbour_key(rt, a, -1));

    m.insert("ds_list_create", |rt, _| Ok(Value::from(rt.ds.create_list())));
    m.insert("ds_list_destroy", |rt, a| {
        rt.ds.lists.remove(&int(a, 0)?);
        Ok(Value::ZERO)
    });
    m.insert("ds_list_add", |rt, a| {
        let id = int(a, 0)?;
        if let Some(list) = rt.ds.lists.get_mut(&id) {
            list.extend(a[1..].iter().cloned());
        }
        Ok(Value::ZERO)
    });
    m.insert("ds_list_find_value", |rt, a| {
        let index = int(a, 1)?;
        Ok(rt
            .ds
            .list(int(a, 0)?)
            .zip(usize::try_from(index).ok())
            .and_then(|(list, i)| list.get(i))
            .cloned()
            .unwrap_or(Value::Undefined))
    });
    m.insert("ds_list_size", |rt, a| {
        Ok(Value::from(rt.ds.list(int(a, 0)?).map_or(0, |l| l.len() as i32)))
    });
}

fn key_value(key: Option<&String>) -> Value {
    key.map_or(Value::Undefined, |k| Value::Str(k.clone()))
}

fn map_set(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let id = int(args, 0)?;
    let key = arg(args, 1)?.to_str();
    let value = arg(args, 2)?.clone();
    if let Some(map) = rt.ds.map_mut(id) {
        map.insert(key, value);
    }
    Ok(Value::ZERO)
}

/// Replace the destination map's contents with a copy of the source map.
fn map_copy(rt: &mut Runtime, args: &[Value]) -> VmResult<Value> {
    let (dest, src) = (int(args, 0)?, int(args, 1)?);
    if let Some(source) = rt.ds.map(src).cloned() {
        if let Some(target) = rt.ds.map_mut(dest) {
            *target = source;
        }
    }
    Ok(Value::ZERO)
}

/// Key `step` positions away from the given key in insertion order.
fn neighbour_key(rt: &mut Runtime, args: &[Value], step: isize) -> VmResult<Value> {
    let key = arg(args, 1)?.to_str();
    let Some(map) = rt.ds.map(int(args, 0)?) else {
        return Ok(Value::Undefined);
    };
    let next = map
        .get_index_of(&key)
        .and_then(|i| i.checked_add_signed(step))
        .and_then(|i| map.get_index(i))
        .map(|(k, _)| k);
    Ok(key_value(next))
}
