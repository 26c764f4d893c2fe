//! Fixture helpers: assemble real classfiles and lay them out as loose
//! files or JARs.
#![allow(dead_code)]

use ristretto_classfile::attributes::{Annotation, Attribute, Instruction};
use ristretto_classfile::{
    ClassAccessFlags, ClassFile, ConstantPool, Method, MethodAccessFlags, Version,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Assemble a classfile for `name` (internal form, e.g. `com/example/A`).
pub fn class_bytes(
    name: &str,
    super_name: &str,
    configure: impl FnOnce(&mut ConstantPool, &mut ClassFile),
) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_class = pool.add_class(name).unwrap();
    let super_class = pool.add_class(super_name).unwrap();

    let mut class = ClassFile {
        version: Version::Java21 { minor: 0 },
        access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        this_class,
        super_class,
        ..Default::default()
    };
    configure(&mut pool, &mut class);
    class.constant_pool = pool;

    let mut bytes = Vec::new();
    class.to_bytes(&mut bytes).unwrap();
    bytes
}

/// A class with one public method and no body worth speaking of.
pub fn class_with_method(name: &str, method: &str) -> Vec<u8> {
    class_bytes(name, "java/lang/Object", |pool, class| {
        push_method(pool, class, method, vec![Instruction::Return]);
    })
}

/// A subclass of `super_name` (internal form) declaring one public method.
pub fn subclass_with_method(name: &str, super_name: &str, method: &str) -> Vec<u8> {
    let method = method.to_string();
    class_bytes(name, super_name, move |pool, class| {
        push_method(pool, class, &method, vec![Instruction::Return]);
    })
}

/// A class whose `run()V` calls `target_class.target_method()V`.
pub fn class_calling(name: &str, target_class: &str, target_method: &str) -> Vec<u8> {
    let target_class = target_class.to_string();
    let target_method = target_method.to_string();
    class_bytes(name, "java/lang/Object", move |pool, class| {
        let owner = pool.add_class(&target_class).unwrap();
        let target = pool.add_method_ref(owner, target_method.as_str(), "()V").unwrap();
        push_method(
            pool,
            class,
            "run",
            vec![Instruction::Invokestatic(target), Instruction::Return],
        );
    })
}

/// An interface declaring one abstract method.
pub fn interface_bytes(name: &str, method: &str) -> Vec<u8> {
    let mut pool = ConstantPool::default();
    let this_class = pool.add_class(name).unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let name_index = pool.add_utf8(method).unwrap();
    let descriptor_index = pool.add_utf8("()V").unwrap();

    let mut class = ClassFile {
        version: Version::Java21 { minor: 0 },
        access_flags: ClassAccessFlags::PUBLIC
            | ClassAccessFlags::INTERFACE
            | ClassAccessFlags::ABSTRACT,
        this_class,
        super_class,
        ..Default::default()
    };
    class.methods.push(Method {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT,
        name_index,
        descriptor_index,
        ..Default::default()
    });
    class.constant_pool = pool;

    let mut bytes = Vec::new();
    class.to_bytes(&mut bytes).unwrap();
    bytes
}

/// A class annotated with `annotation` (internal form).
pub fn annotated_class(name: &str, annotation: &str) -> Vec<u8> {
    let descriptor = format!("L{annotation};");
    class_bytes(name, "java/lang/Object", move |pool, class| {
        let attr_name = pool.add_utf8("RuntimeVisibleAnnotations").unwrap();
        let type_index = pool.add_utf8(&descriptor).unwrap();
        class.attributes.push(Attribute::RuntimeVisibleAnnotations {
            name_index: attr_name,
            annotations: vec![Annotation {
                type_index,
                elements: Vec::new(),
            }],
        });
    })
}

fn push_method(pool: &mut ConstantPool, class: &mut ClassFile, name: &str, code: Vec<Instruction>) {
    let name_index = pool.add_utf8(name).unwrap();
    let descriptor_index = pool.add_utf8("()V").unwrap();
    let code_name = pool.add_utf8("Code").unwrap();
    class.methods.push(Method {
        access_flags: MethodAccessFlags::PUBLIC,
        name_index,
        descriptor_index,
        attributes: vec![Attribute::Code {
            name_index: code_name,
            max_stack: 2,
            max_locals: 1,
            code,
            exception_table: Vec::new(),
            attributes: Vec::new(),
        }],
        ..Default::default()
    });
}

/// Write a classfile under `root` at its package path.
pub fn write_class(root: &Path, qualified_name: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(format!("{}.class", qualified_name.replace('.', "/")));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

/// Package entries into a JAR at `path`.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}
