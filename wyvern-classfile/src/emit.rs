//! 直线型字节码生成器
//!
//! 织入生成的包装方法体是一段不含分支的直线代码，
//! 因此不需要 StackMapTable 帧。生成器在发射指令的同时
//! 跟踪操作数栈深度，最终写出完整的 Code 属性内容。

use crate::bytes::ByteWriter;

// 用到的操作码子集
const OP_ACONST_NULL: u8 = 0x01;
const OP_ICONST_0: u8 = 0x03;
const OP_BIPUSH: u8 = 0x10;
const OP_SIPUSH: u8 = 0x11;
const OP_LDC: u8 = 0x12;
const OP_LDC_W: u8 = 0x13;
const OP_ILOAD: u8 = 0x15;
const OP_LLOAD: u8 = 0x16;
const OP_FLOAD: u8 = 0x17;
const OP_DLOAD: u8 = 0x18;
const OP_ALOAD: u8 = 0x19;
const OP_ILOAD_0: u8 = 0x1a;
const OP_LLOAD_0: u8 = 0x1e;
const OP_FLOAD_0: u8 = 0x22;
const OP_DLOAD_0: u8 = 0x26;
const OP_ALOAD_0: u8 = 0x2a;
const OP_AASTORE: u8 = 0x53;
const OP_POP: u8 = 0x57;
const OP_DUP: u8 = 0x59;
const OP_IRETURN: u8 = 0xac;
const OP_LRETURN: u8 = 0xad;
const OP_FRETURN: u8 = 0xae;
const OP_DRETURN: u8 = 0xaf;
const OP_ARETURN: u8 = 0xb0;
const OP_RETURN: u8 = 0xb1;
const OP_INVOKEVIRTUAL: u8 = 0xb6;
const OP_INVOKESTATIC: u8 = 0xb8;
const OP_ANEWARRAY: u8 = 0xbd;
const OP_CHECKCAST: u8 = 0xc0;

/// Code 属性生成器
pub struct CodeBuilder {
    code: Vec<u8>,
    current_stack: u16,
    max_stack: u16,
    max_locals: u16,
}

impl CodeBuilder {
    /// `max_locals` 由方法签名决定：this（如有）加上各参数的槽位数
    pub fn new(max_locals: u16) -> Self {
        Self {
            code: Vec::new(),
            current_stack: 0,
            max_stack: 0,
            max_locals,
        }
    }

    fn bump(&mut self, delta: i32) {
        let next = self.current_stack as i32 + delta;
        // 直线代码的栈深不会为负，出现负值说明生成逻辑有缺陷
        debug_assert!(next >= 0, "operand stack underflow in generated code");
        self.current_stack = next.max(0) as u16;
        self.max_stack = self.max_stack.max(self.current_stack);
    }

    pub fn aconst_null(&mut self) {
        self.code.push(OP_ACONST_NULL);
        self.bump(1);
    }

    /// 压入 int 常量，自动选择最短编码；超出 short 范围时需先把
    /// Integer 常量放入常量池并改用 [`CodeBuilder::ldc`]
    pub fn push_int(&mut self, value: i32) -> bool {
        match value {
            0..=5 => {
                self.code.push(OP_ICONST_0 + value as u8);
            }
            -128..=127 => {
                self.code.push(OP_BIPUSH);
                self.code.push(value as i8 as u8);
            }
            -32768..=32767 => {
                self.code.push(OP_SIPUSH);
                self.code.extend_from_slice(&(value as i16).to_be_bytes());
            }
            _ => return false,
        }
        self.bump(1);
        true
    }

    /// 从常量池压入单槽常量（Integer/String/Class 等）
    pub fn ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.code.push(OP_LDC);
            self.code.push(index as u8);
        } else {
            self.code.push(OP_LDC_W);
            self.code.extend_from_slice(&index.to_be_bytes());
        }
        self.bump(1);
    }

    fn load(&mut self, short_base: u8, generic: u8, slot: u16, width: i32) {
        if slot <= 3 {
            self.code.push(short_base + slot as u8);
        } else {
            self.code.push(generic);
            self.code.push(slot as u8);
        }
        self.bump(width);
    }

    pub fn iload(&mut self, slot: u16) {
        self.load(OP_ILOAD_0, OP_ILOAD, slot, 1);
    }

    pub fn lload(&mut self, slot: u16) {
        self.load(OP_LLOAD_0, OP_LLOAD, slot, 2);
    }

    pub fn fload(&mut self, slot: u16) {
        self.load(OP_FLOAD_0, OP_FLOAD, slot, 1);
    }

    pub fn dload(&mut self, slot: u16) {
        self.load(OP_DLOAD_0, OP_DLOAD, slot, 2);
    }

    pub fn aload(&mut self, slot: u16) {
        self.load(OP_ALOAD_0, OP_ALOAD, slot, 1);
    }

    /// `anewarray`：弹出长度，压入数组引用
    pub fn anewarray(&mut self, class_index: u16) {
        self.code.push(OP_ANEWARRAY);
        self.code.extend_from_slice(&class_index.to_be_bytes());
        // -1 +1
    }

    pub fn dup(&mut self) {
        self.code.push(OP_DUP);
        self.bump(1);
    }

    pub fn aastore(&mut self) {
        self.code.push(OP_AASTORE);
        self.bump(-3);
    }

    /// `invokestatic`：`arg_slots` 为参数占用的栈槽总数，`ret_slots` 为返回值槽数
    pub fn invokestatic(&mut self, method_ref: u16, arg_slots: u16, ret_slots: u16) {
        self.code.push(OP_INVOKESTATIC);
        self.code.extend_from_slice(&method_ref.to_be_bytes());
        self.bump(ret_slots as i32 - arg_slots as i32);
    }

    /// `invokevirtual`：`arg_slots` 不含接收者
    pub fn invokevirtual(&mut self, method_ref: u16, arg_slots: u16, ret_slots: u16) {
        self.code.push(OP_INVOKEVIRTUAL);
        self.code.extend_from_slice(&method_ref.to_be_bytes());
        self.bump(ret_slots as i32 - arg_slots as i32 - 1);
    }

    pub fn checkcast(&mut self, class_index: u16) {
        self.code.push(OP_CHECKCAST);
        self.code.extend_from_slice(&class_index.to_be_bytes());
    }

    pub fn pop(&mut self) {
        self.code.push(OP_POP);
        self.bump(-1);
    }

    pub fn ireturn(&mut self) {
        self.code.push(OP_IRETURN);
        self.current_stack = 0;
    }

    pub fn lreturn(&mut self) {
        self.code.push(OP_LRETURN);
        self.current_stack = 0;
    }

    pub fn freturn(&mut self) {
        self.code.push(OP_FRETURN);
        self.current_stack = 0;
    }

    pub fn dreturn(&mut self) {
        self.code.push(OP_DRETURN);
        self.current_stack = 0;
    }

    pub fn areturn(&mut self) {
        self.code.push(OP_ARETURN);
        self.current_stack = 0;
    }

    pub fn return_void(&mut self) {
        self.code.push(OP_RETURN);
        self.current_stack = 0;
    }

    /// 当前已发射的代码长度
    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    /// 生成 Code 属性的内容字节（不含属性头）
    pub fn finish(self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.code.len() + 12);
        writer.u16(self.max_stack);
        writer.u16(self.max_locals);
        writer.u32(self.code.len() as u32);
        writer.bytes(&self.code);
        writer.u16(0); // exception_table_length
        writer.u16(0); // attributes_count
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_void_body() {
        let mut builder = CodeBuilder::new(1);
        builder.return_void();
        let info = builder.finish();
        assert_eq!(
            info,
            vec![0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0xb1, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_push_int_encodings() {
        let mut builder = CodeBuilder::new(0);
        assert!(builder.push_int(3)); // iconst_3
        assert!(builder.push_int(100)); // bipush
        assert!(builder.push_int(30000)); // sipush
        assert!(!builder.push_int(100_000)); // 需要 ldc
        builder.pop();
        builder.pop();
        builder.pop();
        builder.return_void();

        let info = builder.finish();
        // max_stack = 3：三个 int 同时在栈上
        assert_eq!(&info[0..2], &[0x00, 0x03]);
        assert_eq!(&info[8..13], &[0x06, 0x10, 0x64, 0x11, 0x75]);
    }

    #[test]
    fn test_stack_tracking_through_call() {
        let mut builder = CodeBuilder::new(3);
        builder.aload(0);
        builder.lload(1);
        // 假设调用 (J)J 的静态方法：弹 2 槽，压 2 槽
        builder.invokestatic(7, 2, 2);
        builder.lreturn();
        let info = builder.finish();
        // 峰值：this + long = 3 槽
        assert_eq!(&info[0..2], &[0x00, 0x03]);
        assert_eq!(&info[2..4], &[0x00, 0x03]);
    }

    #[test]
    fn test_wide_load_slots() {
        let mut builder = CodeBuilder::new(10);
        builder.aload(7);
        builder.pop();
        builder.return_void();
        let info = builder.finish();
        assert_eq!(&info[8..10], &[0x19, 0x07]); // aload 7
    }
}
