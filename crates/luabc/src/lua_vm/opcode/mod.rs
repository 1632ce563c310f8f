mod instruction;

pub use instruction::Instruction;

/// Instruction format modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    IABC,
    IABx,
    IAsBx,
    IAx,
}

/// Lua 5.3 opcode set (47 opcodes), numbered as in lopcodes.h
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Move = 0, // R(A) := R(B)
    LoadK,    // R(A) := Kst(Bx)
    LoadKX,   // R(A) := Kst(extra arg)
    LoadBool, // R(A) := (Bool)B; if (C) pc++
    LoadNil,  // R(A), R(A+1), ..., R(A+B) := nil
    GetUpval, // R(A) := UpValue[B]

    GetTabUp, // R(A) := UpValue[B][RK(C)]
    GetTable, // R(A) := R(B)[RK(C)]

    SetTabUp, // UpValue[A][RK(B)] := RK(C)
    SetUpval, // UpValue[B] := R(A)
    SetTable, // R(A)[RK(B)] := RK(C)

    NewTable, // R(A) := {} (size = B,C)

    Self_, // R(A+1) := R(B); R(A) := R(B)[RK(C)]

    Add,  // R(A) := RK(B) + RK(C)
    Sub,  // R(A) := RK(B) - RK(C)
    Mul,  // R(A) := RK(B) * RK(C)
    Mod,  // R(A) := RK(B) % RK(C)
    Pow,  // R(A) := RK(B) ^ RK(C)
    Div,  // R(A) := RK(B) / RK(C)
    IDiv, // R(A) := RK(B) // RK(C)
    BAnd, // R(A) := RK(B) & RK(C)
    BOr,  // R(A) := RK(B) | RK(C)
    BXor, // R(A) := RK(B) ~ RK(C)
    Shl,  // R(A) := RK(B) << RK(C)
    Shr,  // R(A) := RK(B) >> RK(C)
    Unm,  // R(A) := -R(B)
    BNot, // R(A) := ~R(B)
    Not,  // R(A) := not R(B)
    Len,  // R(A) := length of R(B)

    Concat, // R(A) := R(B).. ... ..R(C)

    Jmp, // pc += sBx; if (A) close all upvalues >= R(A - 1)
    Eq,  // if ((RK(B) == RK(C)) ~= A) then pc++
    Lt,  // if ((RK(B) <  RK(C)) ~= A) then pc++
    Le,  // if ((RK(B) <= RK(C)) ~= A) then pc++

    Test,    // if not (R(A) <=> C) then pc++
    TestSet, // if (R(B) <=> C) then R(A) := R(B) else pc++

    Call,     // R(A), ... ,R(A+C-2) := R(A)(R(A+1), ... ,R(A+B-1))
    TailCall, // return R(A)(R(A+1), ... ,R(A+B-1))
    Return,   // return R(A), ... ,R(A+B-2)

    ForLoop, // R(A)+=R(A+2); if R(A) <?= R(A+1) then { pc+=sBx; R(A+3)=R(A) }
    ForPrep, // R(A)-=R(A+2); pc+=sBx

    TForCall, // R(A+3), ... ,R(A+2+C) := R(A)(R(A+1), R(A+2));
    TForLoop, // if R(A+1) ~= nil then { R(A)=R(A+1); pc += sBx }

    SetList, // R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B

    Closure, // R(A) := closure(KPROTO[Bx])

    Vararg, // R(A), R(A+1), ..., R(A+B-2) = vararg

    ExtraArg, // extra (larger) argument for previous opcode
}

const OPCODES: [OpCode; 47] = {
    use OpCode::*;
    [
        Move, LoadK, LoadKX, LoadBool, LoadNil, GetUpval, GetTabUp, GetTable, SetTabUp, SetUpval,
        SetTable, NewTable, Self_, Add, Sub, Mul, Mod, Pow, Div, IDiv, BAnd, BOr, BXor, Shl, Shr,
        Unm, BNot, Not, Len, Concat, Jmp, Eq, Lt, Le, Test, TestSet, Call, TailCall, Return,
        ForLoop, ForPrep, TForCall, TForLoop, SetList, Closure, Vararg, ExtraArg,
    ]
};

impl OpCode {
    /// Decode an opcode number; `None` for numbers outside the 5.3 set.
    #[inline(always)]
    pub fn from_u8(byte: u8) -> Option<Self> {
        OPCODES.get(byte as usize).copied()
    }

    /// Get the instruction format mode for this opcode
    /// Based on Lua 5.3 lopcodes.c luaP_opmodes table
    pub fn get_mode(self) -> OpMode {
        use OpCode::*;
        match self {
            LoadK | LoadKX | Closure => OpMode::IABx,
            Jmp | ForLoop | ForPrep | TForLoop => OpMode::IAsBx,
            ExtraArg => OpMode::IAx,
            _ => OpMode::IABC,
        }
    }

    /// Upper-case mnemonic as printed by `luac -l`.
    pub fn name(self) -> &'static str {
        use OpCode::*;
        match self {
            Move => "MOVE",
            LoadK => "LOADK",
            LoadKX => "LOADKX",
            LoadBool => "LOADBOOL",
            LoadNil => "LOADNIL",
            GetUpval => "GETUPVAL",
            GetTabUp => "GETTABUP",
            GetTable => "GETTABLE",
            SetTabUp => "SETTABUP",
            SetUpval => "SETUPVAL",
            SetTable => "SETTABLE",
            NewTable => "NEWTABLE",
            Self_ => "SELF",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Mod => "MOD",
            Pow => "POW",
            Div => "DIV",
            IDiv => "IDIV",
            BAnd => "BAND",
            BOr => "BOR",
            BXor => "BXOR",
            Shl => "SHL",
            Shr => "SHR",
            Unm => "UNM",
            BNot => "BNOT",
            Not => "NOT",
            Len => "LEN",
            Concat => "CONCAT",
            Jmp => "JMP",
            Eq => "EQ",
            Lt => "LT",
            Le => "LE",
            Test => "TEST",
            TestSet => "TESTSET",
            Call => "CALL",
            TailCall => "TAILCALL",
            Return => "RETURN",
            ForLoop => "FORLOOP",
            ForPrep => "FORPREP",
            TForCall => "TFORCALL",
            TForLoop => "TFORLOOP",
            SetList => "SETLIST",
            Closure => "CLOSURE",
            Vararg => "VARARG",
            ExtraArg => "EXTRAARG",
        }
    }
}
