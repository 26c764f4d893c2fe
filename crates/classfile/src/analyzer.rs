use crate::converter;
use jarscope_api::{MemberFacts, MemberKind, NodeKind, RefKind, SymbolRef, UnitFacts};
use ristretto_classfile::attributes::{Attribute, Instruction};
use ristretto_classfile::{
    ClassAccessFlags, ClassFile, Constant, ConstantPool, FieldAccessFlags, FieldType,
    MethodAccessFlags,
};
use std::collections::BTreeSet;
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("malformed classfile: {0}")]
    ClassFile(#[from] ristretto_classfile::Error),
    #[error("malformed constant pool reference: {0}")]
    Pool(String),
}

/// Analyze one classfile into its unit-local fact set.
///
/// Works purely on the constant pool and bytecode; referenced types are never
/// required to be loadable, which is what keeps this phase embarrassingly
/// parallel.
pub fn analyze(bytes: &[u8]) -> Result<UnitFacts, AnalyzeError> {
    let class = ClassFile::from_bytes(&mut Cursor::new(bytes.to_vec()))?;
    let pool = &class.constant_pool;

    let qualified_name = pool_class_name(pool, class.this_class)?;
    let kind = type_kind(&class);
    let annotations = annotations_of(pool, &class.attributes)?;

    let super_class = if class.super_class == 0 {
        None
    } else {
        Some(pool_class_name(pool, class.super_class)?)
    };
    let mut interfaces = Vec::with_capacity(class.interfaces.len());
    for index in &class.interfaces {
        interfaces.push(pool_class_name(pool, *index)?);
    }

    let mut type_refs = BTreeSet::new();
    if let Some(super_name) = &super_class {
        type_refs.insert(SymbolRef::to_type(RefKind::Extends, super_name.clone()));
    }
    for iface in &interfaces {
        type_refs.insert(SymbolRef::to_type(RefKind::Implements, iface.clone()));
    }
    for annotation in &annotations {
        type_refs.insert(SymbolRef::to_type(RefKind::AnnotatedBy, annotation.clone()));
    }

    let enclosing = qualified_name
        .rsplit_once('$')
        .map(|(outer, _)| outer.to_string());

    let mut members = Vec::with_capacity(class.fields.len() + class.methods.len());
    for field in &class.fields {
        members.push(analyze_field(pool, field)?);
    }
    for method in &class.methods {
        members.push(analyze_method(pool, method)?);
    }

    tracing::trace!(
        class = %qualified_name,
        members = members.len(),
        "analyzed classfile"
    );

    Ok(UnitFacts {
        qualified_name,
        kind,
        synthetic: class.access_flags.contains(ClassAccessFlags::SYNTHETIC),
        modifiers: converter::class_modifiers(class.access_flags),
        annotations,
        enclosing,
        super_class,
        interfaces,
        refs: type_refs.into_iter().collect(),
        members,
    })
}

fn type_kind(class: &ClassFile) -> NodeKind {
    let flags = class.access_flags;
    if flags.contains(ClassAccessFlags::ANNOTATION) {
        NodeKind::Annotation
    } else if flags.contains(ClassAccessFlags::INTERFACE) {
        NodeKind::Interface
    } else if flags.contains(ClassAccessFlags::ENUM) {
        NodeKind::Enum
    } else if class
        .attributes
        .iter()
        .any(|attr| matches!(attr, Attribute::Record { .. }))
    {
        // Record classes carry no access flag; only the attribute tells.
        NodeKind::Record
    } else {
        NodeKind::Class
    }
}

fn analyze_field(
    pool: &ConstantPool,
    field: &ristretto_classfile::Field,
) -> Result<MemberFacts, AnalyzeError> {
    let name = utf8(pool, field.name_index)?;
    let descriptor = utf8(pool, field.descriptor_index)?;
    let annotations = annotations_of(pool, &field.attributes)?;

    let mut refs = BTreeSet::new();
    if let Some(class) = converter::class_of_field_type(&field.field_type) {
        refs.insert(SymbolRef::to_type(RefKind::ReferencesType, class));
    }
    for annotation in &annotations {
        refs.insert(SymbolRef::to_type(RefKind::AnnotatedBy, annotation.clone()));
    }

    Ok(MemberFacts {
        kind: MemberKind::Field,
        name,
        descriptor,
        synthetic: field.access_flags.contains(FieldAccessFlags::SYNTHETIC),
        bridge: false,
        modifiers: converter::field_modifiers(field.access_flags),
        annotations,
        refs: refs.into_iter().collect(),
    })
}

fn analyze_method(
    pool: &ConstantPool,
    method: &ristretto_classfile::Method,
) -> Result<MemberFacts, AnalyzeError> {
    let name = utf8(pool, method.name_index)?;
    let descriptor = utf8(pool, method.descriptor_index)?;
    let annotations = annotations_of(pool, &method.attributes)?;

    let mut refs = BTreeSet::new();

    // Parameter and return types are outward references too.
    let (params, ret) = FieldType::parse_method_descriptor(&descriptor)?;
    for param in params.iter().chain(ret.iter()) {
        if let Some(class) = converter::class_of_field_type(param) {
            refs.insert(SymbolRef::to_type(RefKind::ReferencesType, class));
        }
    }
    for annotation in &annotations {
        refs.insert(SymbolRef::to_type(RefKind::AnnotatedBy, annotation.clone()));
    }

    for attribute in &method.attributes {
        match attribute {
            Attribute::Code { code, .. } => {
                for instruction in code {
                    scan_instruction(pool, instruction, &mut refs)?;
                }
            }
            Attribute::Exceptions {
                exception_indexes, ..
            } => {
                for index in exception_indexes {
                    let class = pool_class_name(pool, *index)?;
                    refs.insert(SymbolRef::to_type(RefKind::Throws, class));
                }
            }
            _ => {}
        }
    }

    Ok(MemberFacts {
        kind: if name == "<init>" {
            MemberKind::Constructor
        } else {
            MemberKind::Method
        },
        name,
        descriptor,
        synthetic: method.access_flags.contains(MethodAccessFlags::SYNTHETIC),
        bridge: method.access_flags.contains(MethodAccessFlags::BRIDGE),
        modifiers: converter::method_modifiers(method.access_flags),
        annotations,
        refs: refs.into_iter().collect(),
    })
}

fn scan_instruction(
    pool: &ConstantPool,
    instruction: &Instruction,
    refs: &mut BTreeSet<SymbolRef>,
) -> Result<(), AnalyzeError> {
    match instruction {
        Instruction::Invokevirtual(index)
        | Instruction::Invokespecial(index)
        | Instruction::Invokestatic(index) => {
            if let Some((class, name, descriptor)) = member_ref(pool, *index)? {
                refs.insert(SymbolRef::to_member(RefKind::Calls, class, name, descriptor));
            }
        }
        Instruction::Invokeinterface(index, _) => {
            if let Some((class, name, descriptor)) = member_ref(pool, *index)? {
                refs.insert(SymbolRef::to_member(RefKind::Calls, class, name, descriptor));
            }
        }
        Instruction::Getfield(index) | Instruction::Getstatic(index) => {
            if let Some((class, name, descriptor)) = member_ref(pool, *index)? {
                refs.insert(SymbolRef::to_member(
                    RefKind::ReadsField,
                    class,
                    name,
                    descriptor,
                ));
            }
        }
        Instruction::Putfield(index) | Instruction::Putstatic(index) => {
            if let Some((class, name, descriptor)) = member_ref(pool, *index)? {
                refs.insert(SymbolRef::to_member(
                    RefKind::WritesField,
                    class,
                    name,
                    descriptor,
                ));
            }
        }
        Instruction::New(index) => {
            if let Some(class) = referenced_class(pool, *index)? {
                refs.insert(SymbolRef::to_type(RefKind::Instantiates, class));
            }
        }
        Instruction::Checkcast(index)
        | Instruction::Instanceof(index)
        | Instruction::Anewarray(index) => {
            if let Some(class) = referenced_class(pool, *index)? {
                refs.insert(SymbolRef::to_type(RefKind::ReferencesType, class));
            }
        }
        Instruction::Multianewarray(index, _) => {
            if let Some(class) = referenced_class(pool, *index)? {
                refs.insert(SymbolRef::to_type(RefKind::ReferencesType, class));
            }
        }
        // invokedynamic call sites go through a bootstrap method; the
        // eventual target is not named at the use site.
        _ => {}
    }
    Ok(())
}

/// Annotation type names present on a declaration, sorted and deduplicated.
fn annotations_of(
    pool: &ConstantPool,
    attributes: &[Attribute],
) -> Result<Vec<String>, AnalyzeError> {
    let mut out = BTreeSet::new();
    for attribute in attributes {
        if let Attribute::RuntimeVisibleAnnotations { annotations, .. } = attribute {
            for annotation in annotations {
                let descriptor = utf8(pool, annotation.type_index)?;
                if let Some(class) = converter::class_of_annotation_descriptor(&descriptor) {
                    out.insert(class);
                }
            }
        }
    }
    Ok(out.into_iter().collect())
}

fn utf8(pool: &ConstantPool, index: u16) -> Result<String, AnalyzeError> {
    Ok(pool.try_get_utf8(index)?.to_string())
}

fn pool_class_name(pool: &ConstantPool, index: u16) -> Result<String, AnalyzeError> {
    match pool.try_get(index)? {
        Constant::Class(name_index) => Ok(utf8(pool, *name_index)?.replace('/', ".")),
        other => Err(AnalyzeError::Pool(format!(
            "constant {index} is not a class: {other:?}"
        ))),
    }
}

/// Class behind a `Class` constant, skipping primitive array descriptors.
fn referenced_class(pool: &ConstantPool, index: u16) -> Result<Option<String>, AnalyzeError> {
    match pool.try_get(index)? {
        Constant::Class(name_index) => {
            let raw = utf8(pool, *name_index)?;
            Ok(converter::class_of_pool_name(&raw))
        }
        other => Err(AnalyzeError::Pool(format!(
            "constant {index} is not a class: {other:?}"
        ))),
    }
}

/// Resolve a field/method/interface-method ref into (class, name, descriptor).
fn member_ref(
    pool: &ConstantPool,
    index: u16,
) -> Result<Option<(String, String, String)>, AnalyzeError> {
    let (class_index, nat_index) = match pool.try_get(index)? {
        Constant::FieldRef {
            class_index,
            name_and_type_index,
        }
        | Constant::MethodRef {
            class_index,
            name_and_type_index,
        }
        | Constant::InterfaceMethodRef {
            class_index,
            name_and_type_index,
        } => (*class_index, *name_and_type_index),
        _ => return Ok(None),
    };

    let raw = match pool.try_get(class_index)? {
        Constant::Class(name_index) => utf8(pool, *name_index)?,
        other => {
            return Err(AnalyzeError::Pool(format!(
                "constant {class_index} is not a class: {other:?}"
            )));
        }
    };
    // Calls on array types (e.g. clone()) attribute to the element class.
    let Some(class) = converter::class_of_pool_name(&raw) else {
        return Ok(None);
    };

    match pool.try_get(nat_index)? {
        Constant::NameAndType {
            name_index,
            descriptor_index,
        } => Ok(Some((
            class,
            utf8(pool, *name_index)?,
            utf8(pool, *descriptor_index)?,
        ))),
        other => Err(AnalyzeError::Pool(format!(
            "constant {nat_index} is not a name-and-type: {other:?}"
        ))),
    }
}
