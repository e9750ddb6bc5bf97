//! 包装方法体生成
//!
//! 被织入方法的新方法体是一段直线字节码：压入目标引用（静态方法
//! 为 null）、变换期分配的链编号、装箱后的参数数组，然后
//! `invokestatic` 调用运行时派发桥接方法，最后对返回值做
//! 拆箱/强转并返回。链编号把调用点和清单里固化的拦截器序列
//! 绑定在一起，调用期不做任何规则求值。

use wyvern_classfile::{ClassFileError, CodeBuilder, ConstantPool, JavaType};

/// 运行时派发桥接方法的默认宿主类（内部名）
pub const DEFAULT_DISPATCH_CLASS: &str = "wyvern/runtime/InterceptionRuntime";

/// 派发方法名与描述符：`dispatch(Object target, int chainId, Object[] args)`
pub const DISPATCH_METHOD: &str = "dispatch";
pub const DISPATCH_DESCRIPTOR: &str = "(Ljava/lang/Object;I[Ljava/lang/Object;)Ljava/lang/Object;";

const OBJECT_CLASS: &str = "java/lang/Object";

/// 基础类型的装箱/拆箱信息
struct BoxInfo {
    class: &'static str,
    value_of_descriptor: &'static str,
    unbox_method: &'static str,
    unbox_descriptor: &'static str,
}

fn box_info(java_type: &JavaType) -> Option<BoxInfo> {
    let info = match java_type {
        JavaType::Boolean => BoxInfo {
            class: "java/lang/Boolean",
            value_of_descriptor: "(Z)Ljava/lang/Boolean;",
            unbox_method: "booleanValue",
            unbox_descriptor: "()Z",
        },
        JavaType::Byte => BoxInfo {
            class: "java/lang/Byte",
            value_of_descriptor: "(B)Ljava/lang/Byte;",
            unbox_method: "byteValue",
            unbox_descriptor: "()B",
        },
        JavaType::Char => BoxInfo {
            class: "java/lang/Character",
            value_of_descriptor: "(C)Ljava/lang/Character;",
            unbox_method: "charValue",
            unbox_descriptor: "()C",
        },
        JavaType::Short => BoxInfo {
            class: "java/lang/Short",
            value_of_descriptor: "(S)Ljava/lang/Short;",
            unbox_method: "shortValue",
            unbox_descriptor: "()S",
        },
        JavaType::Int => BoxInfo {
            class: "java/lang/Integer",
            value_of_descriptor: "(I)Ljava/lang/Integer;",
            unbox_method: "intValue",
            unbox_descriptor: "()I",
        },
        JavaType::Long => BoxInfo {
            class: "java/lang/Long",
            value_of_descriptor: "(J)Ljava/lang/Long;",
            unbox_method: "longValue",
            unbox_descriptor: "()J",
        },
        JavaType::Float => BoxInfo {
            class: "java/lang/Float",
            value_of_descriptor: "(F)Ljava/lang/Float;",
            unbox_method: "floatValue",
            unbox_descriptor: "()F",
        },
        JavaType::Double => BoxInfo {
            class: "java/lang/Double",
            value_of_descriptor: "(D)Ljava/lang/Double;",
            unbox_method: "doubleValue",
            unbox_descriptor: "()D",
        },
        _ => return None,
    };
    Some(info)
}

fn load_param(builder: &mut CodeBuilder, java_type: &JavaType, slot: u16) {
    match java_type {
        JavaType::Boolean
        | JavaType::Byte
        | JavaType::Char
        | JavaType::Short
        | JavaType::Int => builder.iload(slot),
        JavaType::Long => builder.lload(slot),
        JavaType::Float => builder.fload(slot),
        JavaType::Double => builder.dload(slot),
        _ => builder.aload(slot),
    }
}

/// 生成包装方法的 Code 属性内容
///
/// 需要的常量池条目（装箱 Methodref、派发 Methodref、类引用）
/// 会被追加到 `pool` 尾部
pub fn generate_wrapper_code(
    pool: &mut ConstantPool,
    dispatch_class: &str,
    parameters: &[JavaType],
    return_type: &JavaType,
    is_static: bool,
    chain_id: i32,
) -> Result<Vec<u8>, ClassFileError> {
    let param_slots: u16 = parameters.iter().map(JavaType::slot_size).sum();
    let max_locals = param_slots + if is_static { 0 } else { 1 };
    let mut builder = CodeBuilder::new(max_locals);

    // 目标引用
    if is_static {
        builder.aconst_null();
    } else {
        builder.aload(0);
    }

    // 链编号
    if !builder.push_int(chain_id) {
        let index = pool.add_integer(chain_id)?;
        builder.ldc(index);
    }

    // 参数数组
    let object_class = pool.add_class(OBJECT_CLASS)?;
    // 参数个数受描述符限制（最多 255），push_int 一定成功
    builder.push_int(parameters.len() as i32);
    builder.anewarray(object_class);

    let mut slot = if is_static { 0 } else { 1 };
    for (position, parameter) in parameters.iter().enumerate() {
        builder.dup();
        builder.push_int(position as i32);
        load_param(&mut builder, parameter, slot);
        if let Some(info) = box_info(parameter) {
            let value_of =
                pool.add_method_ref(info.class, "valueOf", info.value_of_descriptor)?;
            builder.invokestatic(value_of, parameter.slot_size(), 1);
        }
        builder.aastore();
        slot += parameter.slot_size();
    }

    // 派发
    let dispatch = pool.add_method_ref(dispatch_class, DISPATCH_METHOD, DISPATCH_DESCRIPTOR)?;
    builder.invokestatic(dispatch, 3, 1);

    // 返回值转换
    match return_type {
        JavaType::Void => {
            builder.pop();
            builder.return_void();
        }
        JavaType::Object(_) | JavaType::Array(_) => {
            // internal_name 对引用类型总是存在
            if let Some(name) = return_type.internal_name() {
                let class_index = pool.add_class(&name)?;
                builder.checkcast(class_index);
            }
            builder.areturn();
        }
        primitive => {
            if let Some(info) = box_info(primitive) {
                let box_class = pool.add_class(info.class)?;
                builder.checkcast(box_class);
                let unbox =
                    pool.add_method_ref(info.class, info.unbox_method, info.unbox_descriptor)?;
                builder.invokevirtual(unbox, 0, primitive.slot_size());
            }
            match primitive {
                JavaType::Long => builder.lreturn(),
                JavaType::Float => builder.freturn(),
                JavaType::Double => builder.dreturn(),
                _ => builder.ireturn(),
            }
        }
    }

    Ok(builder.finish())
}
